//! The flush task: drains rotated (immutable) memtables and persists them
//! as new L0 tables.
//!
//! Receives from a capacity-1 [`crossbeam_channel`], which is what gives
//! the accept-write task its backpressure — a second rotation blocks until
//! this task has pulled the first `FlushJob` off the channel.

use anyhow::Result;
use crossbeam_channel::{select, Receiver, Sender};
use memtable::Memtable;
use sstable::TableReader;
use std::sync::Arc;

use crate::closer::Closer;
use crate::manifest::TableMeta;
use crate::Inner;

pub(crate) struct FlushJob {
    pub file_id: u32,
    pub memtable: Arc<Memtable>,
}

pub(crate) fn flush_loop(
    inner: Arc<Inner>,
    rx: Receiver<FlushJob>,
    compaction_tx: Sender<()>,
    closer: Closer,
) {
    loop {
        select! {
            recv(closer.has_been_closed()) -> _ => {
                // Drain any job already queued — notably the final memtable
                // `Engine::close` pushes right before signaling this closer.
                while let Ok(job) = rx.try_recv() {
                    process_job(&inner, job, &compaction_tx);
                }
                break;
            }
            recv(rx) -> msg => match msg {
                Ok(job) => process_job(&inner, job, &compaction_tx),
                Err(_) => break,
            }
        }
    }
}

fn process_job(inner: &Inner, job: FlushJob, compaction_tx: &Sender<()>) {
    let file_id = job.file_id;
    if let Err(e) = flush_now(inner, file_id, &job.memtable) {
        tracing::error!(error = %e, file_id, "flush failed, aborting process");
        std::process::abort();
    }
    inner.flushing.lock().retain(|(id, _)| *id != file_id);
    let _ = compaction_tx.try_send(());
}

/// Writes `mem` to a new L0 table file named `<file_id>.table`, registers it
/// in the manifest (saved before the level handler is updated) and in the
/// L0 [`crate::level::LevelHandler`].
///
/// Shared by the background flush task and [`crate::Engine::close`]'s
/// synchronous final flush.
///
/// # Errors
///
/// Returns an error on any I/O failure writing the table or manifest.
pub(crate) fn flush_now(inner: &Inner, file_id: u32, mem: &Memtable) -> Result<()> {
    if mem.is_empty() {
        tracing::warn!(file_id, "skipping flush of an empty memtable");
        return Ok(());
    }

    let path = inner.dir.join(format!("{file_id}.table"));
    sstable::write_from_memtable(&path, mem)?;

    let reader = Arc::new(TableReader::open(file_id, &path)?);
    let footer = reader.file_info();
    inner.manifest.add_l0_file(TableMeta {
        file_id,
        entries: footer.entry_count,
        min_fp: footer.min_fp,
        max_fp: footer.max_fp,
        size_bytes: reader.size(),
    });
    inner.manifest.save()?;
    inner.l0.add_table(file_id, reader);

    tracing::info!(file_id, entries = footer.entry_count, "flushed memtable to L0");
    Ok(())
}
