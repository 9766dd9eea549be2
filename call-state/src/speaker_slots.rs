//! Speaker-slot allocation
//!
//! A fixed number of audio output slots is shared between remote
//! participants. [`SpeakerSlots`] holds the assignment policy; the
//! [`SpeakerSlotAllocator`] drives it from batched call events and reads
//! participant state from the canonical store.
//!
//! Assignment order for a candidate:
//!
//! 1. Ignore it unless its audio track is subscribed
//! 2. Keep it where it is if it already holds a slot
//! 3. Take the lowest empty slot
//! 4. Replace the first occupant whose audio is off or blocked
//! 5. Replace the least recently active occupant, never the active speaker
//! 6. Replace slot 0
//!
//! Slots never move or compact, so a participant keeps its index while it
//! holds a slot.

use std::fmt;
use std::sync::Arc;

use call_api::{CallEvent, ParticipantRecord, SessionId, TrackKind};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::store::CallStateStore;

/// Read access to the participant state the policy depends on
pub trait ParticipantSource {
    fn participant(&self, id: &SessionId) -> Option<Arc<ParticipantRecord>>;

    fn active_speaker(&self) -> Option<SessionId>;

    fn local_session_id(&self) -> Option<SessionId>;
}

impl ParticipantSource for CallStateStore {
    fn participant(&self, id: &SessionId) -> Option<Arc<ParticipantRecord>> {
        CallStateStore::participant(self, id)
    }

    fn active_speaker(&self) -> Option<SessionId> {
        CallStateStore::active_speaker(self)
    }

    fn local_session_id(&self) -> Option<SessionId> {
        CallStateStore::local_session_id(self)
    }
}

/// Result of [`SpeakerSlots::assign`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotAssignment {
    /// Not eligible; nothing changed
    Ignored,
    AlreadyAssigned { index: usize },
    /// Took an empty slot
    Filled { index: usize },
    /// Evicted the previous occupant
    Replaced { index: usize, evicted: SessionId },
}

impl SlotAssignment {
    pub fn index(&self) -> Option<usize> {
        match self {
            SlotAssignment::Ignored => None,
            SlotAssignment::AlreadyAssigned { index }
            | SlotAssignment::Filled { index }
            | SlotAssignment::Replaced { index, .. } => Some(*index),
        }
    }
}

/// Fixed-length slot array; `None` marks an empty slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerSlots {
    slots: Vec<Option<SessionId>>,
}

impl SpeakerSlots {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Option<SessionId>] {
        &self.slots
    }

    pub fn position_of(&self, id: &SessionId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.as_ref() == Some(id))
    }

    /// Occupied slots as `(index, id)`
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &SessionId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|id| (index, id)))
    }

    /// Give `id` a slot, evicting an occupant when all slots are taken
    pub fn assign(&mut self, id: &SessionId, source: &impl ParticipantSource) -> SlotAssignment {
        let eligible = source
            .participant(id)
            .map_or(false, |record| record.audio().subscribed.is_subscribed());
        if !eligible || self.slots.is_empty() {
            return SlotAssignment::Ignored;
        }

        if let Some(index) = self.position_of(id) {
            return SlotAssignment::AlreadyAssigned { index };
        }

        if let Some(index) = self.slots.iter().position(Option::is_none) {
            self.slots[index] = Some(id.clone());
            return SlotAssignment::Filled { index };
        }

        let index = self
            .first_muted(source)
            .or_else(|| self.least_recently_active(source))
            .unwrap_or(0);
        self.replace(index, id)
    }

    /// Clear the slot held by `id`; other slots keep their positions
    pub fn remove(&mut self, id: &SessionId) -> bool {
        match self.position_of(id) {
            Some(index) => {
                self.slots[index] = None;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Lowest occupant whose audio is off or blocked; a missing record counts as off
    fn first_muted(&self, source: &impl ParticipantSource) -> Option<usize> {
        self.occupied()
            .find(|(_, occupant)| {
                source
                    .participant(occupant)
                    .map_or(true, |record| record.audio().state.is_muted())
            })
            .map(|(index, _)| index)
    }

    /// Occupant with the oldest `last_active`, skipping the active speaker
    ///
    /// Never-active occupants come first; ties go to the lower index.
    fn least_recently_active(&self, source: &impl ParticipantSource) -> Option<usize> {
        let active = source.active_speaker();
        self.occupied()
            .filter(|(_, occupant)| active.as_ref() != Some(*occupant))
            .min_by_key(|(index, occupant)| {
                let last_active = source.participant(occupant).and_then(|r| r.last_active);
                (last_active, *index)
            })
            .map(|(index, _)| index)
    }

    fn replace(&mut self, index: usize, id: &SessionId) -> SlotAssignment {
        match self.slots[index].replace(id.clone()) {
            Some(evicted) => SlotAssignment::Replaced { index, evicted },
            None => SlotAssignment::Filled { index },
        }
    }
}

/// Batch-driven owner of the speaker slots
///
/// Cloning shares the same slots.
#[derive(Clone)]
pub struct SpeakerSlotAllocator {
    slots: Arc<Mutex<SpeakerSlots>>,
    store: CallStateStore,
}

impl SpeakerSlotAllocator {
    pub fn new(capacity: usize, store: CallStateStore) -> Self {
        Self {
            slots: Arc::new(Mutex::new(SpeakerSlots::new(capacity))),
            store,
        }
    }

    /// Apply a batch of speaker, track and departure events in order
    ///
    /// Meant to run right after the same batch was reconciled into the store.
    /// A reset anywhere in the batch clears every slot after the other events,
    /// mirroring the store.
    pub fn handle_batch(&self, events: &[CallEvent]) {
        let mut slots = self.slots.lock();
        let mut reset = false;
        for event in events {
            match event {
                CallEvent::ActiveSpeakerChange {
                    session_id: Some(id),
                } => {
                    if self.is_local(id) {
                        continue;
                    }
                    let outcome = slots.assign(id, &self.store);
                    log_assignment(id, &outcome);
                }
                CallEvent::TrackStarted {
                    session_id,
                    local: false,
                    kind: TrackKind::Audio,
                } => {
                    let outcome = slots.assign(session_id, &self.store);
                    log_assignment(session_id, &outcome);
                }
                CallEvent::ParticipantLeft { session_id } => {
                    if slots.remove(session_id) {
                        debug!(session_id = %session_id, "Released speaker slot");
                    }
                }
                CallEvent::LeftMeeting | CallEvent::CallInstanceDestroyed => reset = true,
                _ => {}
            }
        }

        if reset {
            slots.clear();
            debug!("Cleared speaker slots");
        }
    }

    pub fn slots(&self) -> Vec<Option<SessionId>> {
        self.slots.lock().slots().to_vec()
    }

    pub fn position_of(&self, id: &SessionId) -> Option<usize> {
        self.slots.lock().position_of(id)
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().capacity()
    }

    fn is_local(&self, id: &SessionId) -> bool {
        self.store.local_session_id().as_ref() == Some(id)
            || self.store.participant(id).map_or(false, |record| record.local)
    }
}

impl fmt::Debug for SpeakerSlotAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeakerSlotAllocator")
            .field("slots", &self.slots())
            .finish()
    }
}

fn log_assignment(id: &SessionId, outcome: &SlotAssignment) {
    match outcome {
        SlotAssignment::Replaced { index, evicted } => {
            debug!(session_id = %id, index, evicted = %evicted, "Speaker slot replaced");
        }
        SlotAssignment::Filled { index } => {
            debug!(session_id = %id, index, "Speaker slot filled");
        }
        SlotAssignment::AlreadyAssigned { .. } | SlotAssignment::Ignored => {
            trace!(session_id = %id, ?outcome, "Speaker slot unchanged");
        }
    }
}
