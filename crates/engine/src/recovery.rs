//! Startup recovery: load the manifest, open every table file it
//! references into the matching level handler, and clean up any `.tmp`
//! leftovers from a table write interrupted by a crash.
//!
//! There is no write-ahead log in this design (see DESIGN.md): writes that
//! never made it into a flushed L0 table are accepted as lost on crash, so
//! recovery's only job is to reconstruct the durable state the manifest and
//! table files on disk already represent.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::level::LevelHandler;
use crate::manifest::Manifest;
use sstable::TableReader;

/// Loads (or creates) the manifest at `dir` and opens every table it lists
/// into the matching level handler.
///
/// # Errors
///
/// Returns an error if the manifest is present but unparseable, or if a
/// table file the manifest references is missing or malformed.
pub(crate) fn recover(dir: &Path) -> Result<(Manifest, LevelHandler, LevelHandler)> {
    std::fs::create_dir_all(dir)?;
    cleanup_tmp_files(dir);

    let manifest = Manifest::load_or_create(dir)?;
    let l0 = LevelHandler::new();
    let l1 = LevelHandler::new();

    for meta in manifest.copy_l0() {
        let path = dir.join(format!("{}.table", meta.file_id));
        let reader = Arc::new(TableReader::open(meta.file_id, &path)?);
        l0.add_table(meta.file_id, reader);
    }
    for meta in manifest.copy_l1() {
        let path = dir.join(format!("{}.table", meta.file_id));
        let reader = Arc::new(TableReader::open(meta.file_id, &path)?);
        l1.add_table(meta.file_id, reader);
    }

    tracing::info!(
        dir = %dir.display(),
        l0 = manifest.l0_len(),
        l1 = manifest.l1_len(),
        "recovered manifest and opened existing tables"
    );

    Ok((manifest, l0, l1))
}

/// Removes leftover `*.table.tmp` files: a table write that crashed between
/// writing its temp file and the final rename. The manifest never learned
/// about a table under that name, so the half-written temp file is simply
/// garbage.
fn cleanup_tmp_files(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_tmp = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".table.tmp"));
        if !is_tmp {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::warn!(path = %path.display(), "removed leftover temp table from an interrupted write"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove leftover temp table"),
        }
    }
}

#[cfg(test)]
#[path = "tests/recovery_tests.rs"]
mod tests;
