use anyhow::{bail, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use fingerprint::fingerprint;
use memtable::Memtable;
use std::collections::HashMap;
use std::fs::{rename, OpenOptions};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use crate::format::Footer;

/// Builds a table file in memory, one fingerprinted entry at a time, and
/// flushes it to disk atomically.
///
/// `TableBuilder` keeps entries in a `HashMap<u32, (Vec<u8>, Vec<u8>)>` —
/// inserting a fingerprint that is already present overwrites it, the same
/// last-writer-wins rule the memtable itself uses. This is what makes
/// [`TableBuilder::merge_hashmap`] a correct way to fold several ordered
/// sources into one: fold older sources first, newer last, and the final
/// `insert` for any given fingerprint always wins.
pub struct TableBuilder {
    entries: HashMap<u32, (Vec<u8>, Vec<u8>)>,
}

impl TableBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Inserts or overwrites a single key/value pair.
    pub fn append(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let fp = fingerprint(&key);
        self.entries.insert(fp, (key, value));
    }

    /// Folds every `(fingerprint, key, value)` triple from `iter` into this
    /// builder, in iteration order — a later triple for the same
    /// fingerprint overwrites an earlier one.
    ///
    /// Intended to merge the contents of an older table followed by a newer
    /// one (or a newer memtable): call this once per source, oldest first.
    pub fn merge_hashmap<'a, I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = (u32, &'a [u8], &'a [u8])>,
    {
        for (fp, key, value) in iter {
            self.entries.insert(fp, (key.to_vec(), value.to_vec()));
        }
    }

    /// Inserts every entry of a [`Memtable`], oldest semantics equivalent to
    /// `merge_hashmap` over its `iter()`.
    pub fn add(&mut self, mem: &Memtable) {
        for (fp, key, value) in mem.iter() {
            self.entries.insert(fp, (key.to_vec(), value.to_vec()));
        }
    }

    /// Number of distinct fingerprints currently staged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries have been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the staged entries to `path` as a table file.
    ///
    /// Crash-safe: written to `path` with a `.tmp` sibling, fsynced, then
    /// atomically renamed into place. Refuses to write an empty table.
    ///
    /// # Errors
    ///
    /// Returns an error if no entries were staged, or on any I/O failure.
    pub fn finish(self, path: &Path) -> Result<()> {
        if self.entries.is_empty() {
            bail!("refusing to write an empty table (no entries staged)");
        }

        let tmp_path = path.with_extension("table.tmp");
        let raw_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut file = BufWriter::new(raw_file);

        let mut index: Vec<(u32, u32)> = Vec::with_capacity(self.entries.len());
        let mut min_fp = u32::MAX;
        let mut max_fp = 0u32;

        for (fp, (key, value)) in &self.entries {
            let offset = file.stream_position()?;
            file.write_u32::<LittleEndian>(key.len() as u32)?;
            file.write_u32::<LittleEndian>(value.len() as u32)?;
            file.write_all(key)?;
            file.write_all(value)?;

            index.push((*fp, offset as u32));
            min_fp = min_fp.min(*fp);
            max_fp = max_fp.max(*fp);
        }

        let meta_offset = file.stream_position()? as u32;
        for (fp, offset) in &index {
            file.write_u32::<LittleEndian>(*fp)?;
            file.write_u32::<LittleEndian>(*offset)?;
        }

        let entry_count = index.len() as u32;
        let payload_and_index_end = file.stream_position()?;
        let file_size = (payload_and_index_end + crate::format::FOOTER_BYTES) as u32;

        let footer = Footer {
            min_fp,
            max_fp,
            entry_count,
            meta_offset,
            file_size,
        };
        footer.write(&mut file)?;

        file.flush()?;
        file.into_inner()?.sync_all()?;

        rename(&tmp_path, path)?;

        if let Some(parent) = path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts a builder intended to fold multiple sources together (an older
/// table's entries followed by a newer one), for use during compaction and
/// load-balance splits.
#[must_use]
pub fn new_merge_builder() -> TableBuilder {
    TableBuilder::new()
}

/// Flushes a [`Memtable`] directly to a new table file at `path`.
///
/// This is the realization of the memtable's conceptual `to_disk`
/// operation: the dependency runs from `sstable` to `memtable`, not the
/// other way, so the flush is driven from here.
///
/// # Errors
///
/// Returns an error if `mem` is empty or on I/O failure.
pub fn write_from_memtable(path: &Path, mem: &Memtable) -> Result<()> {
    let mut builder = TableBuilder::new();
    builder.add(mem);
    builder.finish(path)
}

#[cfg(test)]
#[path = "tests/writer_tests.rs"]
mod tests;
