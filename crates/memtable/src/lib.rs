//! # Memtable
//!
//! An in-memory, fingerprint-keyed accumulator of pending writes for the
//! hash-indexed storage engine.
//!
//! Unlike a sorted memtable, this one is a flat hash table keyed by
//! [`fingerprint::fingerprint`] of the key. Point lookups are the only
//! operation the engine needs, so there is no requirement to keep entries in
//! key order — trading away range scans for O(1) expected insert/lookup and
//! a hash-indexed on-disk format that never needs to sort anything.
//!
//! ## Collision behavior
//!
//! A `set` on a fingerprint already occupied by a *different* key overwrites
//! that slot (§4.1: "insert or overwrite by fingerprint"). `get` always
//! compares the full key before returning a value, so a collision degrades
//! to a false miss rather than returning the wrong value — it does **not**
//! recover the overwritten entry. Concretely: if `k1` and `k2` collide and
//! `set(k2, v2)` follows `set(k1, v1)` in the *same* memtable generation,
//! `k1`'s data is gone from that memtable. The engine relies on rotation
//! (memtable → immutable → flush) to keep colliding keys that are live at
//! the same time in separate on-disk tables, where each table's own index
//! can hold at most one fingerprint slot but a `Get` continues probing
//! older tables/levels on a collision miss.

use fingerprint::fingerprint;
use std::collections::HashMap;

/// A single stored key/value pair, keyed externally by its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The full key, retained so lookups can verify against fingerprint collisions.
    pub key: Vec<u8>,
    /// The value bytes.
    pub value: Vec<u8>,
}

/// An in-memory write buffer, bounded by a configured byte budget and
/// indexed by fingerprint rather than sorted key order.
#[derive(Debug)]
pub struct Memtable {
    map: HashMap<u32, Entry>,
    capacity: usize,
    occupied: usize,
    min_fp: Option<u32>,
    max_fp: Option<u32>,
}

impl Memtable {
    /// Creates a new, empty memtable with the given byte capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            capacity,
            occupied: 0,
            min_fp: None,
            max_fp: None,
        }
    }

    /// Returns `true` iff `occupied_space() + additional_bytes <= capacity`.
    ///
    /// Callers check this before `set` and rotate the memtable to immutable
    /// when it returns `false` — `set` itself never refuses an insert, so
    /// the engine is responsible for rotating *before* crossing the budget.
    #[must_use]
    pub fn is_enough_space(&self, additional_bytes: usize) -> bool {
        self.occupied.saturating_add(additional_bytes) <= self.capacity
    }

    /// Inserts or overwrites the entry for `key`'s fingerprint.
    ///
    /// If the fingerprint slot is already occupied by the *same* key, the
    /// value is replaced in place. If occupied by a *different* key (a
    /// fingerprint collision), that key's entry is silently evicted — see
    /// the module-level collision note.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let fp = fingerprint(&key);
        let added = key.len() + value.len();

        if let Some(old) = self.map.remove(&fp) {
            self.occupied = self
                .occupied
                .saturating_sub(old.key.len() + old.value.len());
        }
        self.occupied = self.occupied.saturating_add(added);

        self.min_fp = Some(self.min_fp.map_or(fp, |m| m.min(fp)));
        self.max_fp = Some(self.max_fp.map_or(fp, |m| m.max(fp)));

        self.map.insert(fp, Entry { key, value });
    }

    /// Looks up `key`, returning its value if present.
    ///
    /// Computes the fingerprint, finds the slot, then compares the full key
    /// byte-for-byte before returning — a fingerprint hit with a mismatched
    /// key is treated as a miss (fingerprint collision), not a cache hit.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let fp = fingerprint(key);
        self.map.get(&fp).and_then(|e| {
            if e.key == key {
                Some(e.value.as_slice())
            } else {
                None
            }
        })
    }

    /// Returns the number of distinct fingerprints stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the memtable holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the smallest fingerprint observed, if any.
    #[must_use]
    pub fn min_range(&self) -> Option<u32> {
        self.min_fp
    }

    /// Returns the largest fingerprint observed, if any.
    #[must_use]
    pub fn max_range(&self) -> Option<u32> {
        self.max_fp
    }

    /// Returns the total occupied bytes (keys + values of all live entries).
    #[must_use]
    pub fn occupied_space(&self) -> usize {
        self.occupied
    }

    /// Returns the configured byte capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates over `(fingerprint, key, value)` for every entry, in
    /// unspecified order (the order `HashMap` happens to yield).
    ///
    /// Used by [`sstable`](../sstable/index.html)'s table writer to stream
    /// this memtable's contents to disk — fingerprint order in the output
    /// index need not be sorted.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8], &[u8])> {
        self.map
            .iter()
            .map(|(fp, e)| (*fp, e.key.as_slice(), e.value.as_slice()))
    }
}
