//! Reconciliation of event batches into the canonical store
//!
//! Events are applied in delivery order, except that a reset
//! (`left-meeting` / `call-instance-destroyed`) always wins: it is applied
//! after every other event of the same batch, so a stale update can never
//! resurrect a participant after the call ended.

use call_api::CallEvent;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::store::CallStateStore;

/// Outcome of one [`apply_batch`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Events in the batch
    pub events: usize,
    /// Events that changed the store
    pub changes: usize,
    /// Whether the batch ended in a reset
    pub reset: bool,
}

/// Apply a batch using the wall clock for `last_active`
pub fn apply_batch(store: &CallStateStore, events: &[CallEvent]) -> BatchSummary {
    apply_batch_with(store, events, Utc::now)
}

/// Apply a batch with an explicit clock
pub fn apply_batch_with(
    store: &CallStateStore,
    events: &[CallEvent],
    now: impl Fn() -> DateTime<Utc>,
) -> BatchSummary {
    let mut summary = BatchSummary {
        events: events.len(),
        ..BatchSummary::default()
    };

    for event in events {
        if event.is_reset() {
            summary.reset = true;
            continue;
        }
        if apply_event(store, event, now()) {
            summary.changes += 1;
        }
    }

    if summary.reset {
        debug!("Call ended, resetting participant state");
        if store.reset() {
            summary.changes += 1;
        }
    }

    trace!(
        events = summary.events,
        changes = summary.changes,
        reset = summary.reset,
        "Applied event batch"
    );
    summary
}

/// Apply a single event; returns whether the store changed
pub fn apply_event(store: &CallStateStore, event: &CallEvent, now: DateTime<Utc>) -> bool {
    match event {
        CallEvent::JoinedMeeting { participants } => store.init_participants(participants.clone()),
        CallEvent::ParticipantJoined { participant } => store.set_participant(participant.clone()),
        CallEvent::ParticipantUpdated { participant } => {
            store.update_participant(participant.clone())
        }
        CallEvent::ParticipantLeft { session_id } => store.remove_participant(session_id),
        CallEvent::ActiveSpeakerChange { session_id } => {
            let moved = store.set_active_speaker(session_id.clone());
            let touched = match session_id {
                Some(id) => store.touch_last_active(id, now),
                None => false,
            };
            moved || touched
        }
        CallEvent::WaitingParticipantAdded { participant } => {
            store.add_waiting_participant(participant.clone())
        }
        CallEvent::WaitingParticipantUpdated { participant } => {
            store.update_waiting_participant(participant.clone())
        }
        CallEvent::WaitingParticipantRemoved { id } => store.remove_waiting_participant(id),
        CallEvent::LeftMeeting | CallEvent::CallInstanceDestroyed => store.reset(),
        // Track state arrives through participant-updated; these only drive slots
        CallEvent::TrackStarted { .. } | CallEvent::TrackStopped { .. } => false,
    }
}
