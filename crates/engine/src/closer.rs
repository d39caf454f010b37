//! A cooperative, single-shot shutdown signal shared by the four background
//! tasks ([`crate::write`], [`crate::flush`], [`crate::compaction`],
//! [`crate::loadbalance`]).
//!
//! `Closer` is cheap to clone — every background task gets its own handle —
//! and `signal()` is idempotent. A task selects on
//! [`Closer::has_been_closed`] alongside its work channel; once the closer's
//! sender is dropped, every outstanding receiver observes a disconnect and
//! the task exits its loop.

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone)]
pub struct Closer {
    tx: Arc<Mutex<Option<Sender<()>>>>,
    rx: Receiver<()>,
}

impl Closer {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }

    /// Signals every task holding a clone of this `Closer` to shut down.
    /// Safe to call more than once.
    pub fn signal(&self) {
        self.tx.lock().take();
    }

    /// Returns a receiver that becomes ready (disconnected) once `signal`
    /// has been called. Intended for use inside `crossbeam_channel::select!`.
    #[must_use]
    pub fn has_been_closed(&self) -> Receiver<()> {
        self.rx.clone()
    }

    /// Returns `true` if `signal` has already been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(
            self.rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }
}

impl Default for Closer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsignaled_closer_is_not_closed() {
        let c = Closer::new();
        assert!(!c.is_closed());
    }

    #[test]
    fn signal_is_observed_by_every_clone() {
        let c = Closer::new();
        let c2 = c.clone();
        c.signal();
        assert!(c.is_closed());
        assert!(c2.is_closed());
    }

    #[test]
    fn signal_is_idempotent() {
        let c = Closer::new();
        c.signal();
        c.signal();
        assert!(c.is_closed());
    }
}
