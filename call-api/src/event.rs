//! Call lifecycle events
//!
//! Every event the engine can deliver is a variant of [`CallEvent`]. Consumers
//! match exhaustively, so a new event kind cannot slip through unhandled.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::model::{ParticipantRecord, SessionId, TrackKind, WaitingParticipant};

/// Event type discriminator, one physical engine listener exists per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    JoinedMeeting,
    ParticipantJoined,
    ParticipantUpdated,
    ParticipantLeft,
    ActiveSpeakerChange,
    TrackStarted,
    TrackStopped,
    WaitingParticipantAdded,
    WaitingParticipantUpdated,
    WaitingParticipantRemoved,
    LeftMeeting,
    CallInstanceDestroyed,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::JoinedMeeting,
        EventKind::ParticipantJoined,
        EventKind::ParticipantUpdated,
        EventKind::ParticipantLeft,
        EventKind::ActiveSpeakerChange,
        EventKind::TrackStarted,
        EventKind::TrackStopped,
        EventKind::WaitingParticipantAdded,
        EventKind::WaitingParticipantUpdated,
        EventKind::WaitingParticipantRemoved,
        EventKind::LeftMeeting,
        EventKind::CallInstanceDestroyed,
    ];

    /// Engine-side event name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::JoinedMeeting => "joined-meeting",
            EventKind::ParticipantJoined => "participant-joined",
            EventKind::ParticipantUpdated => "participant-updated",
            EventKind::ParticipantLeft => "participant-left",
            EventKind::ActiveSpeakerChange => "active-speaker-change",
            EventKind::TrackStarted => "track-started",
            EventKind::TrackStopped => "track-stopped",
            EventKind::WaitingParticipantAdded => "waiting-participant-added",
            EventKind::WaitingParticipantUpdated => "waiting-participant-updated",
            EventKind::WaitingParticipantRemoved => "waiting-participant-removed",
            EventKind::LeftMeeting => "left-meeting",
            EventKind::CallInstanceDestroyed => "call-instance-destroyed",
        }
    }

    /// Kinds that wipe the participant set
    pub fn is_reset(&self) -> bool {
        matches!(self, EventKind::LeftMeeting | EventKind::CallInstanceDestroyed)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseError::UnknownEventKind(s.to_string()))
    }
}

/// A single event delivered by the call engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum CallEvent {
    /// The local participant joined; carries the full participant snapshot
    JoinedMeeting {
        participants: Vec<ParticipantRecord>,
    },
    ParticipantJoined {
        participant: ParticipantRecord,
    },
    ParticipantUpdated {
        participant: ParticipantRecord,
    },
    #[serde(rename_all = "camelCase")]
    ParticipantLeft {
        session_id: SessionId,
    },
    /// `None` when nobody is speaking
    #[serde(rename_all = "camelCase")]
    ActiveSpeakerChange {
        session_id: Option<SessionId>,
    },
    #[serde(rename_all = "camelCase")]
    TrackStarted {
        session_id: SessionId,
        local: bool,
        kind: TrackKind,
    },
    #[serde(rename_all = "camelCase")]
    TrackStopped {
        session_id: SessionId,
        local: bool,
        kind: TrackKind,
    },
    WaitingParticipantAdded {
        participant: WaitingParticipant,
    },
    WaitingParticipantUpdated {
        participant: WaitingParticipant,
    },
    WaitingParticipantRemoved {
        id: String,
    },
    LeftMeeting,
    CallInstanceDestroyed,
}

impl CallEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CallEvent::JoinedMeeting { .. } => EventKind::JoinedMeeting,
            CallEvent::ParticipantJoined { .. } => EventKind::ParticipantJoined,
            CallEvent::ParticipantUpdated { .. } => EventKind::ParticipantUpdated,
            CallEvent::ParticipantLeft { .. } => EventKind::ParticipantLeft,
            CallEvent::ActiveSpeakerChange { .. } => EventKind::ActiveSpeakerChange,
            CallEvent::TrackStarted { .. } => EventKind::TrackStarted,
            CallEvent::TrackStopped { .. } => EventKind::TrackStopped,
            CallEvent::WaitingParticipantAdded { .. } => EventKind::WaitingParticipantAdded,
            CallEvent::WaitingParticipantUpdated { .. } => EventKind::WaitingParticipantUpdated,
            CallEvent::WaitingParticipantRemoved { .. } => EventKind::WaitingParticipantRemoved,
            CallEvent::LeftMeeting => EventKind::LeftMeeting,
            CallEvent::CallInstanceDestroyed => EventKind::CallInstanceDestroyed,
        }
    }

    /// Session id of the acting participant, if the event has one
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            CallEvent::ParticipantJoined { participant }
            | CallEvent::ParticipantUpdated { participant } => Some(&participant.session_id),
            CallEvent::ParticipantLeft { session_id }
            | CallEvent::TrackStarted { session_id, .. }
            | CallEvent::TrackStopped { session_id, .. } => Some(session_id),
            CallEvent::ActiveSpeakerChange { session_id } => session_id.as_ref(),
            CallEvent::JoinedMeeting { .. }
            | CallEvent::WaitingParticipantAdded { .. }
            | CallEvent::WaitingParticipantUpdated { .. }
            | CallEvent::WaitingParticipantRemoved { .. }
            | CallEvent::LeftMeeting
            | CallEvent::CallInstanceDestroyed => None,
        }
    }

    pub fn is_reset(&self) -> bool {
        self.kind().is_reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("participant-joined", EventKind::ParticipantJoined)]
    #[case("active-speaker-change", EventKind::ActiveSpeakerChange)]
    #[case("call-instance-destroyed", EventKind::CallInstanceDestroyed)]
    #[case("waiting-participant-removed", EventKind::WaitingParticipantRemoved)]
    fn test_event_kind_names(#[case] name: &str, #[case] kind: EventKind) {
        assert_eq!(name.parse::<EventKind>().unwrap(), kind);
        assert_eq!(kind.to_string(), name);
    }

    #[test]
    fn test_unknown_event_kind() {
        assert_eq!(
            "network-quality-change".parse::<EventKind>(),
            Err(ParseError::UnknownEventKind("network-quality-change".to_string()))
        );
    }

    #[test]
    fn test_all_kinds_have_unique_names() {
        let mut names: Vec<_> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }

    #[test]
    fn test_event_deserializes_from_engine_payload() {
        let event: CallEvent = serde_json::from_value(json!({
            "action": "track-started",
            "sessionId": "b",
            "local": false,
            "kind": "audio"
        }))
        .unwrap();

        assert_eq!(event.kind(), EventKind::TrackStarted);
        assert_eq!(event.session_id(), Some(&SessionId::new("b")));
    }

    #[test]
    fn test_reset_events() {
        assert!(CallEvent::LeftMeeting.is_reset());
        assert!(CallEvent::CallInstanceDestroyed.is_reset());
        assert!(!CallEvent::ActiveSpeakerChange { session_id: None }.is_reset());
    }
}
