//! # Engine — hash-indexed storage engine
//!
//! The central orchestrator tying [`memtable`] and [`sstable`] together into
//! a two-level, hash-indexed LSM store. Unlike a sorted-key design, every
//! on-disk table here is addressed by CRC32-Castagnoli fingerprint
//! ([`fingerprint::fingerprint`]) of the key, and compaction/load-balance
//! classify tables by fingerprint-*range* overlap rather than key-range
//! overlap.
//!
//! ## Architecture
//!
//! ```text
//! Set(key, value)
//!   |
//!   v  bounded channel + one-shot completion signal
//! ┌─────────────────────────────────────────────────────┐
//! │                      ENGINE                         │
//! │                                                      │
//! │ write.rs   → accept-write task → active memtable     │
//! │                 |  (memtable full?)                  │
//! │                 v  rotate to immutable                │
//! │ flush.rs   → flush task → new L0 table + manifest     │
//! │                 |  (L0 population over threshold?)    │
//! │                 v                                     │
//! │ compaction.rs → compaction task → merged/promoted L1  │
//! │                 |  (an L1 table over size bound?)      │
//! │                 v                                     │
//! │ loadbalance.rs → load-balance task → split L1 table    │
//! │                                                        │
//! │ read.rs → Get: active → flushing → L0 → L1             │
//! │            (first hit wins; this is the recency order) │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Four long-lived background tasks cooperate over bounded channels: one
//! accepts `Set` requests and serializes all writes to the active memtable
//! (so `Get` never takes a write lock on the hot path), one flushes rotated
//! memtables to L0, one compacts L0 into L1 by fingerprint-range
//! classification, and one splits any L1 table that grows past
//! `max_l1_size`. See [`write`], [`flush`], [`compaction`], [`loadbalance`].
//!
//! ## Module responsibilities
//!
//! | Module | Purpose |
//! |---|---|
//! | [`manifest`] | Authoritative L0/L1 table metadata + monotonic file-id counter. |
//! | [`level`] | In-memory per-level table handle registry, serves point reads. |
//! | [`recovery`] | Startup: load manifest, open existing tables, clean up temp files. |
//! | [`write`] | The accept-write task: the sole writer of the active memtable. |
//! | [`flush`] | The flush task: persists a rotated memtable as a new L0 table. |
//! | [`compaction`] | The compaction task: folds L0 into L1 by fingerprint range. |
//! | [`loadbalance`] | The load-balance task: splits oversized L1 tables. |
//! | [`read`] | The `Get` path. |
//! | [`closer`] | Cooperative single-shot shutdown signal shared by the four tasks. |

mod closer;
mod compaction;
mod flush;
mod level;
mod loadbalance;
mod manifest;
mod read;
mod recovery;
mod write;

use anyhow::{anyhow, Result};
use closer::Closer;
pub use config::Options;
use crossbeam_channel::bounded;
use level::LevelHandler;
use manifest::Manifest;
use memtable::Memtable;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Depth of the bounded queue between [`Engine::set`] callers and the
/// accept-write task. A full queue simply makes `set` block a little longer
/// before its request is accepted — it does not affect correctness.
const WRITE_QUEUE_DEPTH: usize = 1024;

/// State shared by `Engine` and every background task, behind an `Arc` so
/// each task can hold its own handle without borrowing from `Engine`.
pub(crate) struct Inner {
    /// The memtable currently accepting writes. Only [`write::accept_write_loop`]
    /// ever calls `.write()` on this; everyone else only ever reads.
    pub(crate) active: RwLock<Memtable>,
    /// Memtables that have been rotated out of `active` and handed to the
    /// flush task, but have not yet been cleared — kept readable here so a
    /// `Get` in flight during a flush still observes the data (§5: "an
    /// entry being flushed remains visible via the immutable memtable
    /// pointer until the flush task clears that pointer").
    pub(crate) flushing: Mutex<Vec<(u32, Arc<Memtable>)>>,
    pub(crate) manifest: Manifest,
    pub(crate) l0: LevelHandler,
    pub(crate) l1: LevelHandler,
    pub(crate) dir: PathBuf,
    pub(crate) options: Options,
}

/// The four background tasks each get their own [`Closer`], so
/// [`Engine::close`] can signal them in the order spec'd by §4.6/§5: stop
/// accepting writes, stop the maintenance loops, push any final memtable to
/// flush, *then* stop flush.
struct Closers {
    write: Closer,
    flush: Closer,
    compaction: Closer,
    loadbalance: Closer,
}

/// The embedded, hash-indexed key-value store. `Set`/`Get`/`Close` are the
/// entire public surface — see the crate-level docs for the write/read
/// pipeline this wraps.
pub struct Engine {
    inner: Arc<Inner>,
    write_tx: crossbeam_channel::Sender<write::SetRequest>,
    flush_tx: crossbeam_channel::Sender<flush::FlushJob>,
    closers: Closers,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("dir", &self.inner.dir)
            .field("memtable_occupied", &self.inner.active.read().occupied_space())
            .field("l0_len", &self.inner.manifest.l0_len())
            .field("l1_len", &self.inner.manifest.l1_len())
            .finish()
    }
}

impl Engine {
    /// Opens (or creates) a store at `options.path`, recovering the manifest
    /// and any existing table files, and starts the four background tasks.
    ///
    /// # Errors
    ///
    /// Returns a [`config::ConfigError`]-wrapped error if `options` fails
    /// validation, or any I/O error encountered while recovering the
    /// manifest or opening existing table files.
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;

        let dir = options.path.clone();
        let (manifest, l0, l1) = recovery::recover(&dir)?;

        let inner = Arc::new(Inner {
            active: RwLock::new(Memtable::new(options.memtable_size)),
            flushing: Mutex::new(Vec::new()),
            manifest,
            l0,
            l1,
            dir,
            options,
        });

        let closers = Closers {
            write: Closer::new(),
            flush: Closer::new(),
            compaction: Closer::new(),
            loadbalance: Closer::new(),
        };

        let (write_tx, write_rx) = bounded::<write::SetRequest>(WRITE_QUEUE_DEPTH);
        let (flush_tx, flush_rx) = bounded::<flush::FlushJob>(1);
        let (compaction_tx, compaction_rx) = bounded::<()>(1);
        let (loadbalance_tx, loadbalance_rx) = bounded::<()>(1);

        let mut handles = Vec::with_capacity(4);

        handles.push({
            let inner = Arc::clone(&inner);
            let flush_tx = flush_tx.clone();
            let closer = closers.write.clone();
            std::thread::spawn(move || write::accept_write_loop(inner, write_rx, flush_tx, closer))
        });
        handles.push({
            let inner = Arc::clone(&inner);
            let compaction_tx = compaction_tx.clone();
            let closer = closers.flush.clone();
            std::thread::spawn(move || flush::flush_loop(inner, flush_rx, compaction_tx, closer))
        });
        handles.push({
            let inner = Arc::clone(&inner);
            let loadbalance_tx = loadbalance_tx.clone();
            let closer = closers.compaction.clone();
            std::thread::spawn(move || {
                compaction::compaction_loop(inner, compaction_rx, loadbalance_tx, closer)
            })
        });
        handles.push({
            let inner = Arc::clone(&inner);
            let closer = closers.loadbalance.clone();
            std::thread::spawn(move || loadbalance::loadbalance_loop(inner, loadbalance_rx, closer))
        });

        Ok(Self {
            inner,
            write_tx,
            flush_tx,
            closers,
            handles: Mutex::new(handles),
        })
    }

    /// Inserts or overwrites `key` with `value`.
    ///
    /// Blocks until the accept-write task has applied the write to the
    /// active memtable. Per §5: a `Get` issued after this returns observes
    /// the value, because `set` does not return until the memtable holds
    /// it.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept-write task is no longer running (it
    /// only ever stops via [`Engine::close`]) or if a rotation it performed
    /// along the way hit an I/O error bad enough to be surfaced here rather
    /// than aborting the process.
    pub fn set(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let (done, done_rx) = bounded(1);
        self.write_tx
            .send(write::SetRequest { key, value, done })
            .map_err(|_| anyhow!("accept-write task is not running"))?;
        done_rx
            .recv()
            .map_err(|_| anyhow!("accept-write task dropped the completion signal"))?
    }

    /// Looks up `key`, checking the active memtable, any memtables pending
    /// flush, L0, then L1 in that order — the recency order, so the first
    /// hit is always the most recent write.
    ///
    /// Runs inline on the calling thread; no task handoff.
    ///
    /// # Errors
    ///
    /// Returns an error if an on-disk table read fails (I/O or a malformed
    /// record). A plain miss, or a fingerprint collision against a
    /// different key, is `Ok(None)`, never an error.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        read::get(&self.inner, key)
    }

    /// Shuts the engine down: stops accepting new writes, stops the
    /// maintenance loops, flushes any remaining active memtable, then stops
    /// the flush task and persists the manifest.
    ///
    /// The order matters (§4.6): compaction is stopped *before* the final
    /// flush is pushed, so there is no window where compaction could read
    /// the manifest while flush is also about to mutate it after
    /// compaction's own closer.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or the manifest save fails.
    /// Per §6/§7, callers of a faithful deployment would treat this as
    /// fatal; this implementation still returns it so tests can assert on
    /// it rather than aborting under the test harness.
    pub fn close(self) -> Result<()> {
        self.closers.write.signal();
        self.closers.compaction.signal();
        self.closers.loadbalance.signal();

        let final_job = {
            let mut active = self.inner.active.write();
            if active.is_empty() {
                None
            } else {
                let file_id = self.inner.manifest.next_file_id();
                let full = std::mem::replace(
                    &mut *active,
                    Memtable::new(self.inner.options.memtable_size),
                );
                let full = Arc::new(full);
                self.inner.flushing.lock().push((file_id, Arc::clone(&full)));
                Some(flush::FlushJob {
                    file_id,
                    memtable: full,
                })
            }
        };

        if let Some(job) = final_job {
            let file_id = job.file_id;
            if self.flush_tx.send(job).is_err() {
                tracing::warn!(file_id, "flush task already gone, flushing final memtable inline");
                let mem = self
                    .inner
                    .flushing
                    .lock()
                    .iter()
                    .find(|(id, _)| *id == file_id)
                    .map(|(_, m)| Arc::clone(m));
                if let Some(mem) = mem {
                    flush::flush_now(&self.inner, file_id, &mem)?;
                }
            }
        }
        self.closers.flush.signal();

        for handle in self.handles.lock().drain(..) {
            let _ = handle.join();
        }

        self.inner.manifest.save()?;
        tracing::info!(dir = %self.inner.dir.display(), "engine closed");
        Ok(())
    }

    /// Number of tables currently registered at L0 — test/observability hook.
    #[must_use]
    pub fn l0_len(&self) -> usize {
        self.inner.manifest.l0_len()
    }

    /// Number of tables currently registered at L1 — test/observability hook.
    #[must_use]
    pub fn l1_len(&self) -> usize {
        self.inner.manifest.l1_len()
    }
}

#[cfg(test)]
mod tests;
