use anyhow::{bail, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::format::Footer;

/// Maximum key size we'll allocate during reads (64 KiB). Prevents OOM on corrupt files.
const MAX_KEY_BYTES: usize = 64 * 1024;
/// Maximum value size we'll allocate during reads (64 MiB). Prevents OOM on corrupt files.
const MAX_VALUE_BYTES: usize = 64 * 1024 * 1024;

/// Reads a table file for point lookups and full scans.
///
/// On [`open`](TableReader::open) the entire index region is loaded into
/// memory as a `HashMap<u32, u32>` (fingerprint → payload offset). A
/// persistent file handle stays open for the lifetime of the reader,
/// wrapped in a `Mutex` so `get` works through a shared `&self`.
pub struct TableReader {
    /// Table file identifier (its filename stem, parsed as `u32`).
    id: u32,
    path: PathBuf,
    index: HashMap<u32, u32>,
    file: Mutex<BufReader<File>>,
    footer: Footer,
}

impl TableReader {
    /// Opens a table file identified by `id`, loading its index into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is too small, the magic is wrong, the
    /// footer's `file_size` disagrees with the actual file size, or any I/O
    /// operation fails.
    pub fn open<P: AsRef<Path>>(id: u32, path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let mut f = File::open(&path_buf)?;

        let footer = Footer::read(&mut f)?;

        let index_end = footer.file_size as u64 - crate::format::FOOTER_BYTES;
        f.seek(SeekFrom::Start(u64::from(footer.meta_offset)))?;

        let mut index = HashMap::with_capacity(footer.entry_count as usize);
        while f.stream_position()? < index_end {
            let fp = f.read_u32::<LittleEndian>()?;
            let offset = f.read_u32::<LittleEndian>()?;
            index.insert(fp, offset);
        }

        if index.len() as u32 != footer.entry_count {
            bail!(
                "table {id}: index region held {} entries, footer claims {}",
                index.len(),
                footer.entry_count
            );
        }

        f.seek(SeekFrom::Start(0))?;

        Ok(Self {
            id,
            path: path_buf,
            index,
            file: Mutex::new(BufReader::new(f)),
            footer,
        })
    }

    /// The table's file identifier.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Total file size in bytes, per the footer.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.footer.file_size)
    }

    /// The parsed footer (`min_fp`, `max_fp`, `entry_count`, ...).
    #[must_use]
    pub fn file_info(&self) -> Footer {
        self.footer
    }

    /// Point lookup for a single key.
    ///
    /// Returns `Ok(Some(value))` if the fingerprint is present **and** the
    /// stored key matches `key` byte-for-byte. A fingerprint hit with a
    /// mismatching key is a fingerprint collision, not corruption, and is
    /// reported as `Ok(None)` rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, or if the on-disk record is
    /// malformed (lengths exceeding sane maxima).
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let fp = fingerprint::fingerprint(key);
        let offset = match self.index.get(&fp) {
            Some(&o) => o,
            None => return Ok(None),
        };

        let mut f = self
            .file
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))?;
        f.seek(SeekFrom::Start(u64::from(offset)))?;

        let key_len = f.read_u32::<LittleEndian>()? as usize;
        let value_len = f.read_u32::<LittleEndian>()? as usize;
        if key_len > MAX_KEY_BYTES {
            bail!("corrupt payload: key_len {key_len} exceeds maximum {MAX_KEY_BYTES}");
        }
        if value_len > MAX_VALUE_BYTES {
            bail!("corrupt payload: value_len {value_len} exceeds maximum {MAX_VALUE_BYTES}");
        }

        let mut key_buf = vec![0u8; key_len];
        f.read_exact(&mut key_buf)?;
        let mut value_buf = vec![0u8; value_len];
        f.read_exact(&mut value_buf)?;

        if key_buf != key {
            return Ok(None);
        }

        Ok(Some(value_buf))
    }

    /// Streams every `(fingerprint, key, value)` record in the payload
    /// region, in on-disk (append) order — not index order.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or a malformed record.
    pub fn iter(&self) -> Result<Vec<(u32, Vec<u8>, Vec<u8>)>> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))?;
        f.seek(SeekFrom::Start(0))?;

        let mut out = Vec::with_capacity(self.footer.entry_count as usize);
        while f.stream_position()? < u64::from(self.footer.meta_offset) {
            let key_len = f.read_u32::<LittleEndian>()? as usize;
            let value_len = f.read_u32::<LittleEndian>()? as usize;
            if key_len > MAX_KEY_BYTES {
                bail!("corrupt payload: key_len {key_len} exceeds maximum {MAX_KEY_BYTES}");
            }
            if value_len > MAX_VALUE_BYTES {
                bail!("corrupt payload: value_len {value_len} exceeds maximum {MAX_VALUE_BYTES}");
            }
            let mut key = vec![0u8; key_len];
            f.read_exact(&mut key)?;
            let mut value = vec![0u8; value_len];
            f.read_exact(&mut value)?;
            let fp = fingerprint::fingerprint(&key);
            out.push((fp, key, value));
        }

        f.seek(SeekFrom::Start(0))?;
        Ok(out)
    }

    /// Materialized alias for [`iter`](TableReader::iter), kept for callers
    /// that prefer an owned snapshot without the verb `iter` implying
    /// laziness.
    ///
    /// # Errors
    ///
    /// Same as [`iter`](TableReader::iter).
    pub fn entries(&self) -> Result<Vec<(u32, Vec<u8>, Vec<u8>)>> {
        self.iter()
    }

    /// Resets the internal read cursor to the start of the payload region.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying seek fails.
    pub fn seek_begin(&self) -> Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))?;
        f.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Drops the held file handle. A `TableReader` cannot be used after
    /// this call; construct a new one via [`open`](TableReader::open) to
    /// read the file again.
    pub fn close(self) {
        drop(self);
    }

    /// Number of entries in the in-memory index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the table holds zero entries (never produced by
    /// [`TableBuilder::finish`](crate::TableBuilder::finish), but checked
    /// defensively by callers that construct tables from arbitrary paths).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The path this reader was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "tests/reader_tests.rs"]
mod tests;
