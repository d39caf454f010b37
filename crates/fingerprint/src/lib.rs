//! # Fingerprint
//!
//! The single index key used by every on-disk table in the hash-indexed
//! storage engine: a 32-bit CRC32 over the key bytes, using the Castagnoli
//! polynomial (the same variant used by iSCSI, ext4 metadata checksums,
//! and Ceph — not the IEEE polynomial most "crc32" crates default to).
//!
//! Fingerprints are not unique: two distinct keys may collide. Every layer
//! that indexes by fingerprint (the memtable, the on-disk table) also
//! stores the full key alongside it and re-verifies on lookup, so a
//! collision degrades to a false miss at that layer rather than returning
//! the wrong value.

/// Computes the Castagnoli CRC32 ("CRC32-C") of `key`.
///
/// This is the sole index key for memtables and on-disk tables. It is a
/// pure function of the key bytes only — the value never influences it.
#[must_use]
pub fn fingerprint(key: &[u8]) -> u32 {
    crc32c::crc32c(key)
}
