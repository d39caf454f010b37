//! The load-balance task: splits any L1 table whose size exceeds
//! `max_l1_size` into two new L1 tables with disjoint fingerprint ranges.
//!
//! §9 Open Question 4 flags the source's median as "the middle element by
//! insertion order, not by fingerprint value", which does not guarantee
//! balanced halves. This implementation takes the strengthening the spec
//! suggests: materialize the table's entries, sort by fingerprint, and split
//! at the fingerprint *value* sitting at the midpoint — entries below it go
//! to one new table, the rest to the other. The two outputs' ranges are
//! disjoint by construction and their union is the original table's range
//! (property 8).

use anyhow::Result;
use crossbeam_channel::{select, tick, Receiver};
use sstable::TableReader;
use std::sync::Arc;
use std::time::Duration;

use crate::closer::Closer;
use crate::manifest::TableMeta;
use crate::Inner;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub(crate) fn loadbalance_loop(inner: Arc<Inner>, rx: Receiver<()>, closer: Closer) {
    let ticker = tick(POLL_INTERVAL);
    loop {
        select! {
            recv(closer.has_been_closed()) -> _ => break,
            recv(rx) -> msg => if msg.is_err() { break },
            recv(ticker) -> _ => {}
        }

        loop {
            match split_once(&inner) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::error!(error = %e, "load-balance split failed, aborting process");
                    std::process::abort();
                }
            }
        }
    }
}

/// Finds one L1 table over `max_l1_size` and splits it. Returns `true` if a
/// split was performed (the caller loops until `false` to drain a backlog
/// of oversized tables in one wakeup).
fn split_once(inner: &Inner) -> Result<bool> {
    let l1 = inner.manifest.copy_l1();
    let max_l1_size = inner.options.max_l1_size as u64;
    let Some(candidate) = l1.iter().find(|t| t.size_bytes > max_l1_size) else {
        return Ok(false);
    };

    let reader = open_l1(inner, candidate.file_id)?;
    let mut entries = reader.entries()?;
    entries.sort_by_key(|(fp, _, _)| *fp);

    if entries.len() < 2 {
        // Nothing meaningful to split; leave it oversized rather than loop
        // forever on a table with one giant entry.
        return Ok(false);
    }
    let median_fp = entries[entries.len() / 2].0;

    let mut low = sstable::new_merge_builder();
    let mut high = sstable::new_merge_builder();
    for (fp, key, value) in &entries {
        if *fp < median_fp {
            low.append(key.clone(), value.clone());
        } else {
            high.append(key.clone(), value.clone());
        }
    }

    if low.is_empty() || high.is_empty() {
        // Every entry shares (or exceeds) the median fingerprint — a split
        // here would just reproduce the original table. Leave it be.
        return Ok(false);
    }

    let low_id = inner.manifest.next_file_id();
    let low_path = inner.dir.join(format!("{low_id}.table"));
    low.finish(&low_path)?;
    let low_reader = Arc::new(TableReader::open(low_id, &low_path)?);
    let low_footer = low_reader.file_info();
    let low_meta = TableMeta {
        file_id: low_id,
        entries: low_footer.entry_count,
        min_fp: low_footer.min_fp,
        max_fp: low_footer.max_fp,
        size_bytes: low_reader.size(),
    };

    let high_id = inner.manifest.next_file_id();
    let high_path = inner.dir.join(format!("{high_id}.table"));
    high.finish(&high_path)?;
    let high_reader = Arc::new(TableReader::open(high_id, &high_path)?);
    let high_footer = high_reader.file_info();
    let high_meta = TableMeta {
        file_id: high_id,
        entries: high_footer.entry_count,
        min_fp: high_footer.min_fp,
        max_fp: high_footer.max_fp,
        size_bytes: high_reader.size(),
    };

    inner.manifest.delete_l1_table(candidate.file_id);
    inner.manifest.add_l1_file(low_meta);
    inner.manifest.add_l1_file(high_meta);
    inner.manifest.save()?;

    inner.l1.delete_table(candidate.file_id);
    inner.l1.add_table(low_id, low_reader);
    inner.l1.add_table(high_id, high_reader);
    let _ = std::fs::remove_file(inner.dir.join(format!("{}.table", candidate.file_id)));

    tracing::info!(
        original = candidate.file_id,
        low = low_id,
        high = high_id,
        "split oversized L1 table"
    );
    Ok(true)
}

fn open_l1(inner: &Inner, file_id: u32) -> Result<Arc<TableReader>> {
    if let Some(r) = inner.l1.snapshot().into_iter().find(|r| r.id() == file_id) {
        return Ok(r);
    }
    let path = inner.dir.join(format!("{file_id}.table"));
    Ok(Arc::new(TableReader::open(file_id, &path)?))
}

#[cfg(test)]
#[path = "tests/loadbalance_tests.rs"]
mod tests;
