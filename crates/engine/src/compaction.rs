//! The compaction task: folds L0 tables into L1, classifying each
//! candidate's fingerprint range against the existing L1 ranges rather than
//! a sorted key range.
//!
//! Cold start (no L1 tables yet): wait for at least two L0 tables, pick the
//! two with the highest entries-per-byte density, and merge them into the
//! first L1 table.
//!
//! Steady state: once L0 reaches the configured `no_of_l0_files`
//! threshold, take the densest L0 table and classify it via
//! [`crate::manifest::Manifest::find_l1_policy`]:
//!
//! - `NotUnion` — no L1 range overlaps; the table is relabeled from L0 to
//!   L1 in place, with no rewrite.
//! - `Union(id)` — exactly one L1 table overlaps; merge into it.
//! - `Overlapping(ids)` — more than one L1 table overlaps; merge into all
//!   of them plus the L0 candidate, producing one new L1 table.

use anyhow::Result;
use crossbeam_channel::{select, tick, Receiver, Sender};
use sstable::TableReader;
use std::sync::Arc;
use std::time::Duration;

use crate::closer::Closer;
use crate::manifest::{L1Policy, TableMeta};
use crate::Inner;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub(crate) fn compaction_loop(
    inner: Arc<Inner>,
    rx: Receiver<()>,
    loadbalance_tx: Sender<()>,
    closer: Closer,
) {
    let ticker = tick(POLL_INTERVAL);
    loop {
        select! {
            recv(closer.has_been_closed()) -> _ => break,
            recv(rx) -> msg => if msg.is_err() { break },
            recv(ticker) -> _ => {}
        }

        // The `no_of_l0_files` threshold only gates *starting* a drain pass.
        // Once started, keep processing until L0 is fully drained (or the
        // cold-start path runs out of pairs) rather than stopping the moment
        // the count dips back under the threshold.
        if !should_compact(&inner) {
            continue;
        }

        loop {
            match compact_once(&inner) {
                Ok(true) => {
                    let _ = loadbalance_tx.try_send(());
                }
                Ok(false) => break,
                Err(e) => {
                    tracing::error!(error = %e, "compaction failed, aborting process");
                    std::process::abort();
                }
            }
        }
    }
}

/// Whether a drain pass should begin: cold start wants at least two L0
/// tables to merge into the first L1 table; steady state waits for the
/// configured L0 backlog threshold.
fn should_compact(inner: &Inner) -> bool {
    if inner.manifest.l1_len() == 0 {
        inner.manifest.l0_len() >= 2
    } else {
        inner.manifest.l0_len() >= inner.options.no_of_l0_files
    }
}

/// Performs a single compaction step. Returns `true` if work was done (the
/// caller loops until `false` to drain a backlog in one wakeup).
fn compact_once(inner: &Inner) -> Result<bool> {
    inner.manifest.sort_l0();
    let l0 = inner.manifest.copy_l0();

    if inner.manifest.l1_len() == 0 {
        if l0.len() < 2 {
            return Ok(false);
        }
        merge_into_new_l1(inner, &[l0[0], l0[1]], &[])?;
        return Ok(true);
    }

    if l0.is_empty() {
        return Ok(false);
    }

    let candidate = l0[0];
    match inner
        .manifest
        .find_l1_policy(candidate.min_fp, candidate.max_fp)
    {
        L1Policy::NotUnion => {
            inner.manifest.delete_l0_table(candidate.file_id);
            inner.manifest.add_l1_file(candidate);
            inner.manifest.save()?;
            if let Some(reader) = inner.l0.delete_table(candidate.file_id) {
                inner.l1.add_table(candidate.file_id, reader);
            }
            tracing::info!(
                file_id = candidate.file_id,
                "promoted L0 table to L1 in place (no fingerprint range overlap)"
            );
        }
        L1Policy::Union(l1_id) => {
            let l1_meta = find_meta(&inner.manifest.copy_l1(), l1_id).ok_or_else(|| {
                anyhow::anyhow!("manifest inconsistency: L1 file {l1_id} missing")
            })?;
            merge_into_new_l1(inner, &[l1_meta, candidate], &[l1_id])?;
        }
        L1Policy::Overlapping(l1_ids) => {
            let all_l1 = inner.manifest.copy_l1();
            let mut sources: Vec<TableMeta> = l1_ids
                .iter()
                .filter_map(|id| find_meta(&all_l1, *id))
                .collect();
            sources.push(candidate);
            merge_into_new_l1(inner, &sources, &l1_ids)?;
        }
    }

    Ok(true)
}

fn find_meta(metas: &[TableMeta], file_id: u32) -> Option<TableMeta> {
    metas.iter().copied().find(|m| m.file_id == file_id)
}

/// Merges `sources` into one new L1 table, then deletes every table that
/// contributed to it (from both the manifest and the level handlers).
///
/// File ids are monotonic with recency, so `sources` is sorted by ascending
/// `file_id` before merging regardless of the order callers pass in — that
/// way the oldest table is always appended first and
/// [`sstable::TableBuilder::merge_hashmap`]'s last-writer-wins overwrite
/// always gives the newest data priority on a shared fingerprint.
fn merge_into_new_l1(inner: &Inner, sources: &[TableMeta], l1_ids_to_remove: &[u32]) -> Result<()> {
    let mut sources = sources.to_vec();
    sources.sort_by_key(|m| m.file_id);
    let sources = sources.as_slice();

    let mut builder = sstable::new_merge_builder();

    for meta in sources {
        let reader = open_any_level(inner, meta.file_id)?;
        let entries = reader.iter()?;
        builder.merge_hashmap(
            entries
                .iter()
                .map(|(fp, k, v)| (*fp, k.as_slice(), v.as_slice())),
        );
    }

    let new_id = inner.manifest.next_file_id();
    let path = inner.dir.join(format!("{new_id}.table"));
    builder.finish(&path)?;

    let new_reader = Arc::new(TableReader::open(new_id, &path)?);
    let footer = new_reader.file_info();
    let new_meta = TableMeta {
        file_id: new_id,
        entries: footer.entry_count,
        min_fp: footer.min_fp,
        max_fp: footer.max_fp,
        size_bytes: new_reader.size(),
    };

    for meta in sources {
        if l1_ids_to_remove.contains(&meta.file_id) {
            inner.manifest.delete_l1_table(meta.file_id);
        } else {
            inner.manifest.delete_l0_table(meta.file_id);
        }
    }
    inner.manifest.add_l1_file(new_meta);
    inner.manifest.save()?;

    for meta in sources {
        if l1_ids_to_remove.contains(&meta.file_id) {
            inner.l1.delete_table(meta.file_id);
        } else {
            inner.l0.delete_table(meta.file_id);
        }
        let _ = std::fs::remove_file(inner.dir.join(format!("{}.table", meta.file_id)));
    }
    inner.l1.add_table(new_id, new_reader);

    tracing::info!(
        new_file_id = new_id,
        sources = sources.len(),
        "compacted into new L1 table"
    );
    Ok(())
}

fn open_any_level(inner: &Inner, file_id: u32) -> Result<Arc<TableReader>> {
    if let Some(r) = inner.l0.snapshot().into_iter().find(|r| r.id() == file_id) {
        return Ok(r);
    }
    if let Some(r) = inner.l1.snapshot().into_iter().find(|r| r.id() == file_id) {
        return Ok(r);
    }
    let path = inner.dir.join(format!("{file_id}.table"));
    Ok(Arc::new(TableReader::open(file_id, &path)?))
}

#[cfg(test)]
#[path = "tests/compaction_tests.rs"]
mod tests;
