//! The accept-write task: the single point of serialization for `Set`
//! requests.
//!
//! [`crate::Engine::set`] never mutates the active memtable directly — it
//! sends a [`SetRequest`] over a bounded channel and blocks on its
//! completion signal. This task is the only writer to `Inner::active`,
//! which is what lets the rest of the engine treat "no concurrent writer
//! transactions" as an invariant rather than something each read path has
//! to defend against.

use anyhow::Result;
use crossbeam_channel::{select, Receiver, Sender};
use memtable::Memtable;
use std::sync::Arc;

use crate::closer::Closer;
use crate::flush::FlushJob;
use crate::Inner;

/// A pending `Set`, paired with a one-shot channel the caller blocks on.
pub struct SetRequest {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub done: Sender<Result<()>>,
}

pub(crate) fn accept_write_loop(
    inner: Arc<Inner>,
    rx: Receiver<SetRequest>,
    flush_tx: Sender<FlushJob>,
    closer: Closer,
) {
    loop {
        select! {
            recv(closer.has_been_closed()) -> _ => {
                // Drain whatever was already queued before stopping — a
                // caller blocked in `Engine::set` must still get a reply.
                while let Ok(req) = rx.try_recv() {
                    handle_one(&inner, req, &flush_tx);
                }
                break;
            }
            recv(rx) -> msg => match msg {
                Ok(req) => handle_one(&inner, req, &flush_tx),
                Err(_) => break,
            }
        }
    }
}

fn handle_one(inner: &Inner, req: SetRequest, flush_tx: &Sender<FlushJob>) {
    let additional = req.key.len() + req.value.len();

    let active = inner.active.read();
    let has_room = active.is_enough_space(additional);
    let is_empty = active.is_empty();
    drop(active);

    // A single entry can exceed `memtable_size` on its own (keys/values are
    // arbitrary byte sequences with no size cap). If the active memtable is
    // already empty, rotating it would hand an empty memtable to flush for
    // no reason — just let the oversized entry sit in the active memtable by
    // itself; it will rotate normally on the next write that doesn't fit.
    if !has_room && !is_empty {
        rotate_active(inner, flush_tx);
    }

    inner.active.write().set(req.key, req.value);
    let _ = req.done.send(Ok(()));
}

/// Swaps the active memtable for a fresh one, keeps the full memtable
/// readable in `Inner::flushing` (so in-flight reads still see it), and
/// hands it to the flush task over the capacity-1 channel.
fn rotate_active(inner: &Inner, flush_tx: &Sender<FlushJob>) {
    let file_id = inner.manifest.next_file_id();
    let full = {
        let mut active = inner.active.write();
        std::mem::replace(&mut *active, Memtable::new(inner.options.memtable_size))
    };
    let full = Arc::new(full);
    inner.flushing.lock().push((file_id, Arc::clone(&full)));

    tracing::info!(file_id, "memtable full, rotating to immutable and handing off to flush");

    if flush_tx.send(FlushJob { file_id, memtable: full }).is_err() {
        tracing::warn!(file_id, "flush task unavailable, rotated memtable stays in memory only");
    }
}
