//! Consuming store change notifications
//!
//! The store sends one [`StateChange`] per watched [`ChangeKey`] per write
//! that actually changed it. A participant that joins emits
//! `ParticipantIds` and `Participant(id)`; a reset emits `Participant(id)` for
//! every record it dropped. Keys that are not watched never reach the queue.

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::store::{ChangeKey, StateChange};

/// Handle on the store's change queue
///
/// All clones of a store share one queue, so each change is taken by exactly
/// one reader. Used as an `Iterator` it blocks until the store is dropped.
///
/// ```rust,ignore
/// store.watch(ChangeKey::ParticipantIds);
/// store.watch(ChangeKey::ActiveSpeaker);
///
/// // Once per frame: recompute each changed view once, however many writes hit it
/// for key in store.changes().drain_keys() {
///     rerender(&key);
/// }
/// ```
pub struct ChangeIterator {
    rx: Arc<Mutex<mpsc::Receiver<StateChange>>>,
}

impl ChangeIterator {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<StateChange>>>) -> Self {
        Self { rx }
    }

    /// Next change; `None` once every store handle is gone
    pub fn recv(&self) -> Option<StateChange> {
        self.rx.lock().ok()?.recv().ok()
    }

    /// Like [`recv`](Self::recv), giving up after `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StateChange> {
        self.rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<StateChange> {
        self.rx.lock().ok()?.try_recv().ok()
    }

    /// Queued changes, without waiting for more
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { inner: self }
    }

    /// Drain the queue into distinct keys, in order of first change
    ///
    /// A burst of writes to the same participant yields one
    /// `Participant(id)`.
    pub fn drain_keys(&self) -> Vec<ChangeKey> {
        let mut keys: Vec<ChangeKey> = Vec::new();
        for change in self.try_iter() {
            if !keys.contains(&change.key) {
                keys.push(change.key);
            }
        }
        keys
    }
}

impl Iterator for ChangeIterator {
    type Item = StateChange;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

pub struct TryIter<'a> {
    inner: &'a ChangeIterator,
}

impl Iterator for TryIter<'_> {
    type Item = StateChange;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}
