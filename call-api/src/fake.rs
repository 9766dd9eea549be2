//! Scriptable in-memory engine for tests and demos

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::engine::{CallEngine, EngineListener, ListenerId};
use crate::event::{CallEvent, EventKind};
use crate::model::ParticipantRecord;

/// In-memory [`CallEngine`] whose events are driven by the test
///
/// `emit` delivers synchronously to every listener of the event's kind, just
/// like a real engine dispatching on its own loop.
#[derive(Default)]
pub struct FakeEngine {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, EngineListener)>>>,
    participants: Mutex<Vec<ParticipantRecord>>,
    snapshot_queries: AtomicU64,
    next_id: AtomicU64,
    destroyed: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every listener of its kind, returning how many ran
    pub fn emit(&self, event: CallEvent) -> usize {
        let listeners: Vec<EngineListener> = self
            .listeners
            .lock()
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in &listeners {
            listener(&event);
        }
        listeners.len()
    }

    pub fn set_participants(&self, participants: Vec<ParticipantRecord>) {
        *self.participants.lock() = participants;
    }

    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    /// Number of physical listeners attached for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }

    pub fn total_listener_count(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }

    /// How many times `participants()` has been called
    pub fn snapshot_queries(&self) -> u64 {
        self.snapshot_queries.load(Ordering::SeqCst)
    }
}

impl CallEngine for FakeEngine {
    fn on(&self, kind: EventKind, listener: EngineListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push((id, listener));
        id
    }

    fn off(&self, kind: EventKind, id: ListenerId) {
        let mut listeners = self.listeners.lock();
        if let Some(list) = listeners.get_mut(&kind) {
            list.retain(|(existing, _)| *existing != id);
            if list.is_empty() {
                listeners.remove(&kind);
            }
        }
    }

    fn participants(&self) -> Vec<ParticipantRecord> {
        self.snapshot_queries.fetch_add(1, Ordering::SeqCst);
        self.participants.lock().clone()
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}
