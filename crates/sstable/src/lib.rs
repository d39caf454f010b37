//! # On-disk tables
//!
//! Immutable, on-disk storage files for the hash-indexed storage engine.
//!
//! When the in-memory [`memtable::Memtable`] exceeds its size threshold the
//! engine flushes it to disk as a table. Tables are *write-once,
//! read-many* — once created they are never modified in place (only
//! replaced wholesale during compaction or a load-balance split).
//!
//! Unlike a traditional SSTable, entries are **not** stored in sorted key
//! order. Each table indexes its payload by [`fingerprint::fingerprint`],
//! the same CRC32-Castagnoli hash the memtable uses, trading range scans
//! for O(1) expected point lookups and a format that never needs to sort
//! anything on flush.
//!
//! See [`format`] for the on-disk byte layout.

mod format;
mod reader;
mod writer;

pub use format::{Footer, FOOTER_BYTES, TABLE_MAGIC};
pub use reader::TableReader;
pub use writer::{new_merge_builder, write_from_memtable, TableBuilder};
