//! Participant, track and waiting-room model types

mod participant;
mod session_id;
mod track;
mod waiting;

pub use participant::{AdminScope, ParticipantRecord, Permissions};
pub use session_id::SessionId;
pub use track::{Subscription, TrackInfo, TrackKind, TrackState, Tracks};
pub use waiting::{AccessLevel, WaitingParticipant};
