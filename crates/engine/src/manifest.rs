//! # Manifest — table-level metadata
//!
//! The authoritative catalog of which table files exist, which level (L0 or
//! L1) each belongs to, and the monotonic file-id counter used to name the
//! next one. Every structural mutation to L0/L1 — a flush, a compaction, a
//! load-balance split — goes through the manifest and is followed by
//! [`Manifest::save`] before the corresponding in-memory [`crate::level::LevelHandler`]
//! is updated, so a crash between the two leaves the manifest as the single
//! source of truth on the next restart.
//!
//! ## File format
//!
//! A small text format, one directive per line, in the same "debuggable
//! over binary" spirit as this store's other metadata:
//!
//! ```text
//! next_file_id:7
//! L0:5:120:10:9000000:4096
//! L1:3:500:0:4294000000:65536
//! ```
//!
//! Each table line is `<level>:<file_id>:<entries>:<min_fp>:<max_fp>:<size_bytes>`.
//!
//! ## Crash safety
//!
//! [`Manifest::save`] writes to a `.tmp` sibling, fsyncs, then renames over
//! the real manifest file — the same write-tmp-then-rename pattern used for
//! table files themselves.

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Manifest filename within the storage directory.
pub const MANIFEST_FILENAME: &str = "MANIFEST";
const MANIFEST_TMP_FILENAME: &str = "MANIFEST.tmp";

/// Metadata the manifest tracks for a single table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMeta {
    pub file_id: u32,
    pub entries: u32,
    pub min_fp: u32,
    pub max_fp: u32,
    pub size_bytes: u64,
}

impl TableMeta {
    /// Entries per byte — used to prioritize cold-start L0 compaction.
    #[must_use]
    pub fn density(&self) -> f64 {
        if self.size_bytes == 0 {
            0.0
        } else {
            f64::from(self.entries) / self.size_bytes as f64
        }
    }

    fn ranges_overlap(&self, other: &TableMeta) -> bool {
        self.min_fp <= other.max_fp && other.min_fp <= self.max_fp
    }
}

/// How a candidate L0 table's fingerprint range relates to the existing L1
/// tables, per fingerprint-range classification rather than key-range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum L1Policy {
    /// No L1 table's range overlaps the candidate's — it can be relabeled
    /// as an L1 table in place, with no rewrite.
    NotUnion,
    /// Exactly one L1 table's range overlaps — merge into that table.
    Union(u32),
    /// More than one L1 table's range overlaps — merge into all of them,
    /// ordered by ascending `min_fp` (ties broken the same way).
    Overlapping(Vec<u32>),
}

#[derive(Debug, Clone, Default)]
struct ManifestState {
    next_file_id: u32,
    l0: Vec<TableMeta>,
    l1: Vec<TableMeta>,
}

/// Persistent catalog of L0/L1 table metadata plus the file-id counter.
pub struct Manifest {
    path: PathBuf,
    state: Mutex<ManifestState>,
}

impl Manifest {
    /// Loads `dir/MANIFEST`, or starts an empty one if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILENAME);
        if !path.exists() {
            return Ok(Self {
                path,
                state: Mutex::new(ManifestState::default()),
            });
        }

        let file = File::open(&path)
            .with_context(|| format!("failed to open manifest at {}", path.display()))?;
        let mut state = ManifestState::default();

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("manifest line {}", line_no + 1))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("next_file_id:") {
                state.next_file_id = rest
                    .parse()
                    .with_context(|| format!("manifest line {}: bad next_file_id", line_no + 1))?;
                continue;
            }

            let mut parts = trimmed.splitn(6, ':');
            let level = parts.next().unwrap_or_default();
            let fields: Vec<&str> = parts.collect();
            if fields.len() != 5 {
                bail!("manifest line {}: malformed table entry", line_no + 1);
            }
            let meta = TableMeta {
                file_id: fields[0].parse()?,
                entries: fields[1].parse()?,
                min_fp: fields[2].parse()?,
                max_fp: fields[3].parse()?,
                size_bytes: fields[4].parse()?,
            };
            match level {
                "L0" => state.l0.push(meta),
                "L1" => state.l1.push(meta),
                other => bail!("manifest line {}: unknown level {other:?}", line_no + 1),
            }
        }

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Persists the manifest atomically: write `.tmp`, fsync, rename.
    ///
    /// # Errors
    ///
    /// Returns an error on any I/O failure.
    pub fn save(&self) -> Result<()> {
        let tmp_path = self.path.with_file_name(MANIFEST_TMP_FILENAME);
        let state = self.state.lock();

        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            writeln!(f, "# hash-indexed storage engine manifest")?;
            writeln!(f, "next_file_id:{}", state.next_file_id)?;
            for t in &state.l0 {
                writeln!(
                    f,
                    "L0:{}:{}:{}:{}:{}",
                    t.file_id, t.entries, t.min_fp, t.max_fp, t.size_bytes
                )?;
            }
            for t in &state.l1 {
                writeln!(
                    f,
                    "L1:{}:{}:{}:{}:{}",
                    t.file_id, t.entries, t.min_fp, t.max_fp, t.size_bytes
                )?;
            }
            f.flush()?;
            f.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }

    /// Allocates and returns the next monotonic file id. Does **not** save —
    /// callers persist the manifest once the table that consumes this id has
    /// actually been written.
    pub fn next_file_id(&self) -> u32 {
        let mut state = self.state.lock();
        let id = state.next_file_id;
        state.next_file_id += 1;
        id
    }

    pub fn add_l0_file(&self, meta: TableMeta) {
        self.state.lock().l0.push(meta);
    }

    pub fn add_l1_file(&self, meta: TableMeta) {
        self.state.lock().l1.push(meta);
    }

    pub fn delete_l0_table(&self, file_id: u32) {
        self.state.lock().l0.retain(|t| t.file_id != file_id);
    }

    pub fn delete_l1_table(&self, file_id: u32) {
        self.state.lock().l1.retain(|t| t.file_id != file_id);
    }

    #[must_use]
    pub fn l0_len(&self) -> usize {
        self.state.lock().l0.len()
    }

    #[must_use]
    pub fn l1_len(&self) -> usize {
        self.state.lock().l1.len()
    }

    #[must_use]
    pub fn copy_l0(&self) -> Vec<TableMeta> {
        self.state.lock().l0.clone()
    }

    #[must_use]
    pub fn copy_l1(&self) -> Vec<TableMeta> {
        self.state.lock().l1.clone()
    }

    /// Reorders L0 metadata by descending density (entries per byte) so
    /// compaction's cold-start path can take the two densest tables first.
    pub fn sort_l0(&self) {
        self.state
            .lock()
            .l0
            .sort_by(|a, b| b.density().partial_cmp(&a.density()).unwrap());
    }

    /// Classifies a candidate L0 fingerprint range `[min_fp, max_fp]`
    /// against the current L1 tables.
    #[must_use]
    pub fn find_l1_policy(&self, min_fp: u32, max_fp: u32) -> L1Policy {
        let state = self.state.lock();
        let candidate = TableMeta {
            file_id: 0,
            entries: 0,
            min_fp,
            max_fp,
            size_bytes: 1,
        };
        let mut overlapping: Vec<&TableMeta> = state
            .l1
            .iter()
            .filter(|t| candidate.ranges_overlap(t))
            .collect();

        match overlapping.len() {
            0 => L1Policy::NotUnion,
            1 => L1Policy::Union(overlapping[0].file_id),
            _ => {
                overlapping.sort_by_key(|t| t.min_fp);
                L1Policy::Overlapping(overlapping.iter().map(|t| t.file_id).collect())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/manifest_tests.rs"]
mod tests;
