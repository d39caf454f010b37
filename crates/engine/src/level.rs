//! A level's in-memory table handles — the read-side counterpart to the
//! entries [`crate::manifest::Manifest`] tracks for that level.
//!
//! Indexed by file id, not by fingerprint range: both L0 (overlapping
//! ranges, checked newest-first) and L1 (disjoint ranges after
//! compaction/load-balance) use the same handler, since a hash-indexed
//! table never sorts by key and "first hit wins" is correct for a level
//! whose ranges may or may not overlap.

use anyhow::Result;
use parking_lot::Mutex;
use sstable::TableReader;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct LevelHandler {
    tables: Mutex<HashMap<u32, Arc<TableReader>>>,
}

impl LevelHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_table(&self, file_id: u32, reader: Arc<TableReader>) {
        self.tables.lock().insert(file_id, reader);
    }

    pub fn delete_table(&self, file_id: u32) -> Option<Arc<TableReader>> {
        self.tables.lock().remove(&file_id)
    }

    /// Looks up `key` across every table in this level. Order among tables
    /// is unspecified; the first table whose index holds the key's
    /// fingerprint (and whose stored key matches) wins.
    ///
    /// # Errors
    ///
    /// Returns an error if a table read fails.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        for reader in self.snapshot() {
            if let Some(value) = reader.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Copies out `Arc` handles to every table currently in this level,
    /// releasing the lock before returning — callers performing I/O
    /// (compaction, load-balance scans) never hold the level lock during
    /// disk reads.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<TableReader>> {
        self.tables.lock().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.lock().is_empty()
    }
}
