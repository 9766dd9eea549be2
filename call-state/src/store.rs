//! Canonical participant state
//!
//! [`CallStateStore`] is the single source of truth for participant records,
//! the waiting room, the local identity and the active-speaker pointer.
//!
//! Records are held behind `Arc`. A write that would not change a value is
//! suppressed, so readers holding an `Arc` from an earlier read can detect
//! "unchanged" with `Arc::ptr_eq`. Change notifications are only emitted for
//! keys registered with [`CallStateStore::watch`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Instant;

use call_api::{ParticipantRecord, SessionId, WaitingParticipant};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, trace};

use crate::iter::ChangeIterator;
use crate::resolver::{resolve_path, PropertyCache};
use crate::selectors::{ParticipantFilter, ParticipantSort};

/// Observable piece of store state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeKey {
    /// The ordered participant index
    ParticipantIds,
    /// One participant record
    Participant(SessionId),
    LocalSessionId,
    ActiveSpeaker,
    WaitingParticipants,
}

/// Notification that a watched key changed
#[derive(Debug, Clone)]
pub struct StateChange {
    pub key: ChangeKey,
    pub timestamp: Instant,
}

impl StateChange {
    pub fn new(key: ChangeKey) -> Self {
        Self {
            key,
            timestamp: Instant::now(),
        }
    }
}

#[derive(Default)]
struct StoreInner {
    /// Join order; every id here has a record and vice versa
    index: Arc<Vec<SessionId>>,
    participants: HashMap<SessionId, Arc<ParticipantRecord>>,
    local_id: Option<SessionId>,
    active_speaker: Option<SessionId>,
    waiting_order: Vec<String>,
    waiting: HashMap<String, Arc<WaitingParticipant>>,
}

impl StoreInner {
    fn push_index(&mut self, id: &SessionId, changes: &mut Vec<ChangeKey>) {
        if !self.index.contains(id) {
            Arc::make_mut(&mut self.index).push(id.clone());
            changes.push(ChangeKey::ParticipantIds);
        }
    }

    fn set_local(&mut self, id: Option<SessionId>, changes: &mut Vec<ChangeKey>) {
        if self.local_id != id {
            self.local_id = id;
            changes.push(ChangeKey::LocalSessionId);
        }
    }

    /// Store `record` unless deep-equal to the current one
    fn put_record(&mut self, record: ParticipantRecord, changes: &mut Vec<ChangeKey>) {
        if let Some(existing) = self.participants.get(&record.session_id) {
            if **existing == record {
                return;
            }
        }
        let id = record.session_id.clone();
        self.participants.insert(id.clone(), Arc::new(record));
        changes.push(ChangeKey::Participant(id));
    }
}

/// Shared-handle participant store
///
/// Cloning the store shares the underlying state.
#[derive(Clone)]
pub struct CallStateStore {
    inner: Arc<RwLock<StoreInner>>,
    watched: Arc<RwLock<HashSet<ChangeKey>>>,
    event_tx: mpsc::Sender<StateChange>,
    event_rx: Arc<Mutex<mpsc::Receiver<StateChange>>>,
    properties: Arc<parking_lot::Mutex<PropertyCache<(SessionId, String)>>>,
}

impl CallStateStore {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            watched: Arc::new(RwLock::new(HashSet::new())),
            event_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
            properties: Arc::new(parking_lot::Mutex::new(PropertyCache::new())),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Participant ids in join order
    ///
    /// Returns the same `Arc` until the index changes.
    pub fn participant_ids(&self) -> Arc<Vec<SessionId>> {
        Arc::clone(&self.inner.read().index)
    }

    /// Participant ids matching `filter`, optionally re-ordered by `sort`
    ///
    /// The sort is stable, so ties keep join order.
    pub fn participant_ids_where(
        &self,
        filter: Option<&ParticipantFilter>,
        sort: Option<&ParticipantSort>,
    ) -> Vec<SessionId> {
        let inner = self.inner.read();
        let mut records: Vec<&Arc<ParticipantRecord>> = inner
            .index
            .iter()
            .filter_map(|id| inner.participants.get(id))
            .filter(|record| filter.map_or(true, |f| f.matches(record)))
            .collect();

        if let Some(sort) = sort {
            records.sort_by(|a, b| sort.compare(a, b));
        }

        records.into_iter().map(|r| r.session_id.clone()).collect()
    }

    pub fn participant(&self, id: &SessionId) -> Option<Arc<ParticipantRecord>> {
        self.inner.read().participants.get(id).cloned()
    }

    pub fn local_participant(&self) -> Option<Arc<ParticipantRecord>> {
        let inner = self.inner.read();
        inner
            .local_id
            .as_ref()
            .and_then(|id| inner.participants.get(id))
            .cloned()
    }

    pub fn local_session_id(&self) -> Option<SessionId> {
        self.inner.read().local_id.clone()
    }

    pub fn active_speaker(&self) -> Option<SessionId> {
        self.inner.read().active_speaker.clone()
    }

    /// Waiting-room entries in arrival order
    pub fn waiting_participants(&self) -> Vec<Arc<WaitingParticipant>> {
        let inner = self.inner.read();
        inner
            .waiting_order
            .iter()
            .filter_map(|id| inner.waiting.get(id))
            .cloned()
            .collect()
    }

    pub fn waiting_participant(&self, id: &str) -> Option<Arc<WaitingParticipant>> {
        self.inner.read().waiting.get(id).cloned()
    }

    pub fn participant_count(&self) -> usize {
        self.inner.read().index.len()
    }

    /// Resolve a dot path on a participant record
    ///
    /// Two reads of the same `(id, path)` return the same `Arc` while the
    /// resolved value is unchanged. `None` when the participant or the path is
    /// missing.
    pub fn participant_property(&self, id: &SessionId, path: &str) -> Option<Arc<Value>> {
        let record = self.participant(id)?;
        let tree = record.to_value();
        let Some(value) = resolve_path(&tree, path) else {
            self.properties.lock().forget(&(id.clone(), path.to_string()));
            return None;
        };
        Some(
            self.properties
                .lock()
                .intern((id.clone(), path.to_string()), value.clone()),
        )
    }

    /// Resolve several paths on one participant, keyed by path
    pub fn participant_properties(
        &self,
        id: &SessionId,
        paths: &[&str],
    ) -> BTreeMap<String, Option<Arc<Value>>> {
        paths
            .iter()
            .map(|path| (path.to_string(), self.participant_property(id, path)))
            .collect()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Replace the participant set with an engine snapshot
    ///
    /// Known participants keep their `last_active`. The local pointer follows
    /// the snapshot's local record. Returns whether anything changed.
    pub fn init_participants(&self, snapshot: Vec<ParticipantRecord>) -> bool {
        self.write(|inner, changes| {
            let mut index = Vec::with_capacity(snapshot.len());
            let mut local = None;
            let mut seen = HashSet::new();

            for record in snapshot {
                let id = record.session_id.clone();
                if record.local && local.is_none() {
                    local = Some(id.clone());
                }
                let record = match inner.participants.get(&id) {
                    Some(prev) => ParticipantRecord::merge(prev, record),
                    None => record,
                };
                inner.put_record(record, changes);
                if seen.insert(id.clone()) {
                    index.push(id);
                }
            }

            let stale: Vec<SessionId> = inner
                .participants
                .keys()
                .filter(|id| !seen.contains(*id))
                .cloned()
                .collect();
            for id in stale {
                inner.participants.remove(&id);
                changes.push(ChangeKey::Participant(id));
            }

            if *inner.index != index {
                inner.index = Arc::new(index);
                changes.push(ChangeKey::ParticipantIds);
            }
            inner.set_local(local, changes);
        })
    }

    /// Insert or overwrite a record (join)
    pub fn set_participant(&self, record: ParticipantRecord) -> bool {
        self.write(|inner, changes| {
            let id = record.session_id.clone();
            let local = record.local;
            inner.push_index(&id, changes);
            inner.put_record(record, changes);
            if local {
                inner.set_local(Some(id), changes);
            }
        })
    }

    /// Shallow-merge an update into the existing record
    ///
    /// An update for an unknown id inserts the payload as-is and appends the id
    /// to the index.
    pub fn update_participant(&self, incoming: ParticipantRecord) -> bool {
        self.write(|inner, changes| {
            let id = incoming.session_id.clone();
            let local = incoming.local;
            let record = match inner.participants.get(&id) {
                Some(prev) => ParticipantRecord::merge(prev, incoming),
                None => {
                    debug!(session_id = %id, "Update for unknown participant, inserting");
                    incoming
                }
            };
            inner.push_index(&id, changes);
            inner.put_record(record, changes);
            if local {
                inner.set_local(Some(id), changes);
            }
        })
    }

    /// Remove a participant; a no-op when the id is unknown
    pub fn remove_participant(&self, id: &SessionId) -> bool {
        let changed = self.write(|inner, changes| {
            if inner.participants.remove(id).is_none() {
                return;
            }
            changes.push(ChangeKey::Participant(id.clone()));

            if inner.index.contains(id) {
                Arc::make_mut(&mut inner.index).retain(|known| known != id);
                changes.push(ChangeKey::ParticipantIds);
            }
            if inner.local_id.as_ref() == Some(id) {
                inner.set_local(None, changes);
            }
        });
        if changed {
            self.properties.lock().retain(|(owner, _)| owner != id);
        }
        changed
    }

    /// Overwrite the active-speaker pointer
    pub fn set_active_speaker(&self, id: Option<SessionId>) -> bool {
        self.write(|inner, changes| {
            if inner.active_speaker != id {
                inner.active_speaker = id;
                changes.push(ChangeKey::ActiveSpeaker);
            }
        })
    }

    /// Stamp `last_active` on a participant; a no-op for unknown ids
    pub fn touch_last_active(&self, id: &SessionId, at: DateTime<Utc>) -> bool {
        self.write(|inner, changes| {
            let Some(prev) = inner.participants.get(id) else {
                trace!(session_id = %id, "No record to stamp last_active on");
                return;
            };
            if prev.last_active == Some(at) {
                return;
            }
            let record = ParticipantRecord {
                last_active: Some(at),
                ..(**prev).clone()
            };
            inner.put_record(record, changes);
        })
    }

    pub fn add_waiting_participant(&self, participant: WaitingParticipant) -> bool {
        self.upsert_waiting(participant)
    }

    /// Update a waiting-room entry; unknown ids are added
    pub fn update_waiting_participant(&self, participant: WaitingParticipant) -> bool {
        self.upsert_waiting(participant)
    }

    pub fn remove_waiting_participant(&self, id: &str) -> bool {
        self.write(|inner, changes| {
            if inner.waiting.remove(id).is_some() {
                inner.waiting_order.retain(|known| known != id);
                changes.push(ChangeKey::WaitingParticipants);
            }
        })
    }

    /// Clear every participant, the local pointer and the active speaker
    ///
    /// The waiting room is left alone.
    pub fn reset(&self) -> bool {
        let changed = self.write(|inner, changes| {
            for id in inner.participants.keys() {
                changes.push(ChangeKey::Participant(id.clone()));
            }
            inner.participants.clear();

            if !inner.index.is_empty() {
                inner.index = Arc::new(Vec::new());
                changes.push(ChangeKey::ParticipantIds);
            }
            inner.set_local(None, changes);
            if inner.active_speaker.take().is_some() {
                changes.push(ChangeKey::ActiveSpeaker);
            }
        });
        if changed {
            self.properties.lock().clear();
        }
        changed
    }

    fn upsert_waiting(&self, participant: WaitingParticipant) -> bool {
        self.write(|inner, changes| {
            if let Some(existing) = inner.waiting.get(&participant.id) {
                if **existing == participant {
                    return;
                }
            } else {
                inner.waiting_order.push(participant.id.clone());
            }
            inner
                .waiting
                .insert(participant.id.clone(), Arc::new(participant));
            changes.push(ChangeKey::WaitingParticipants);
        })
    }

    /// Run a mutation under the write lock, then notify watchers outside it
    fn write(&self, mutate: impl FnOnce(&mut StoreInner, &mut Vec<ChangeKey>)) -> bool {
        let mut changes = Vec::new();
        {
            let mut inner = self.inner.write();
            mutate(&mut *inner, &mut changes);
        }
        let changed = !changes.is_empty();
        self.emit(changes);
        changed
    }

    fn emit(&self, changes: Vec<ChangeKey>) {
        if changes.is_empty() {
            return;
        }
        let watched = self.watched.read();
        for key in changes {
            if watched.contains(&key) {
                // Receiver lives as long as any clone of the store
                let _ = self.event_tx.send(StateChange::new(key));
            }
        }
    }

    // ========================================================================
    // Change notification
    // ========================================================================

    pub fn watch(&self, key: ChangeKey) {
        self.watched.write().insert(key);
    }

    pub fn unwatch(&self, key: &ChangeKey) {
        self.watched.write().remove(key);
    }

    pub fn is_watched(&self, key: &ChangeKey) -> bool {
        self.watched.read().contains(key)
    }

    /// Iterator over changes to watched keys
    pub fn changes(&self) -> ChangeIterator {
        ChangeIterator::new(Arc::clone(&self.event_rx))
    }
}

impl Default for CallStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("CallStateStore")
            .field("participants", &inner.index.len())
            .field("local_id", &inner.local_id)
            .field("active_speaker", &inner.active_speaker)
            .field("waiting", &inner.waiting_order.len())
            .finish()
    }
}
