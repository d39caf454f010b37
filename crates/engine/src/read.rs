//! The read path: `Get`, checking the active memtable, any memtables
//! currently being flushed, L0, then L1 — in that order, newest data first.

use anyhow::Result;

use crate::Inner;

/// Looks up `key`, returning its value if present anywhere in the engine.
///
/// # Errors
///
/// Returns an error if a table read fails (I/O or a malformed record —
/// never for a plain miss, and never for a fingerprint collision against a
/// different key, which is reported as a miss at that layer).
pub(crate) fn get(inner: &Inner, key: &[u8]) -> Result<Option<Vec<u8>>> {
    if let Some(value) = inner.active.read().get(key) {
        return Ok(Some(value.to_vec()));
    }

    for (_, mem) in inner.flushing.lock().iter().rev() {
        if let Some(value) = mem.get(key) {
            return Ok(Some(value.to_vec()));
        }
    }

    if let Some(value) = inner.l0.get(key)? {
        return Ok(Some(value));
    }

    inner.l1.get(key)
}

#[cfg(test)]
#[path = "tests/read_tests.rs"]
mod tests;
