//! On-disk table binary format: constants and footer read/write helpers.
//!
//! A table file has three regions, written in this order and never rewritten
//! once flushed:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ PAYLOAD REGION                                                  │
//! │                                                                 │
//! │ key_len (u32 LE) | value_len (u32 LE) | key | value             │
//! │ ... repeated for each distinct fingerprint, in append order ... │
//! ├───────────────────────────────────────────────────────────────┤
//! │ INDEX REGION                                                    │
//! │                                                                 │
//! │ fingerprint (u32 LE) | payload_offset (u32 LE)                  │
//! │ ... one pair per distinct fingerprint ...                       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (24 bytes, always last)                                  │
//! │                                                                 │
//! │ min_fp (u32 LE) | max_fp (u32 LE) | entry_count (u32 LE)        │
//! │ meta_offset (u32 LE) | file_size (u32 LE) | magic (u32 LE)      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! `meta_offset` is the byte offset where the index region begins — equal
//! to the total size of the payload region, since the payload always comes
//! first. `payload_offset` in each index entry points at that entry's
//! `key_len` prefix inside the payload region. Every field is a plain
//! little-endian `u32`: there is no varint, no sorting requirement, and no
//! room for a bloom filter section — the table is addressed purely by
//! fingerprint.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Result as IoResult, Seek, SeekFrom, Write};

/// Magic number identifying this table format (ASCII-ish "HASH").
pub const TABLE_MAGIC: u32 = 0x4841_5348;

/// Size of the footer in bytes: 6 `u32` fields.
pub const FOOTER_BYTES: u64 = 24;

/// Parsed table footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    /// Smallest fingerprint present in the table.
    pub min_fp: u32,
    /// Largest fingerprint present in the table.
    pub max_fp: u32,
    /// Number of distinct fingerprints (and payload records) in the table.
    pub entry_count: u32,
    /// Byte offset where the index region begins.
    pub meta_offset: u32,
    /// Total size of the file, footer included — used to sanity-check the
    /// file was not truncated.
    pub file_size: u32,
}

impl Footer {
    /// Writes this footer to `w`. `w`'s cursor is left just past the footer.
    pub fn write<W: Write>(&self, w: &mut W) -> IoResult<()> {
        w.write_u32::<LittleEndian>(self.min_fp)?;
        w.write_u32::<LittleEndian>(self.max_fp)?;
        w.write_u32::<LittleEndian>(self.entry_count)?;
        w.write_u32::<LittleEndian>(self.meta_offset)?;
        w.write_u32::<LittleEndian>(self.file_size)?;
        w.write_u32::<LittleEndian>(TABLE_MAGIC)?;
        Ok(())
    }

    /// Reads and validates the footer from `r`, which must support seeking.
    ///
    /// Leaves the cursor at end-of-file on success.
    pub fn read<R: Read + Seek>(r: &mut R) -> IoResult<Footer> {
        let filesize = r.seek(SeekFrom::End(0))?;
        if filesize < FOOTER_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "file too small to contain a table footer",
            ));
        }

        r.seek(SeekFrom::End(-(FOOTER_BYTES as i64)))?;
        let min_fp = r.read_u32::<LittleEndian>()?;
        let max_fp = r.read_u32::<LittleEndian>()?;
        let entry_count = r.read_u32::<LittleEndian>()?;
        let meta_offset = r.read_u32::<LittleEndian>()?;
        let file_size = r.read_u32::<LittleEndian>()?;
        let magic = r.read_u32::<LittleEndian>()?;

        if magic != TABLE_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown table magic: {magic:#010x}"),
            ));
        }
        if u64::from(file_size) != filesize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "footer file_size {file_size} does not match actual size {filesize}"
                ),
            ));
        }
        if u64::from(meta_offset) > filesize.saturating_sub(FOOTER_BYTES) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "footer meta_offset points past the index region",
            ));
        }

        Ok(Footer {
            min_fp,
            max_fp,
            entry_count,
            meta_offset,
            file_size,
        })
    }
}
