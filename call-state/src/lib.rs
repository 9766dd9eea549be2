//! # Call State
//!
//! Canonical participant state for a video call, kept in sync with a call
//! engine through batched events.
//!
//! ## Architecture
//!
//! ```text
//! CallEngine ──► EventBus ──► BatchCollector (call state) ──► reconcile ──► CallStateStore
//!                   │     │                                  └─► SpeakerSlotAllocator ─┘ reads
//!                   │     └─► BatchCollector (waiting room) ──► reconcile ──┘
//!                   │
//!                   └── engine.participants() ◄── Bootstrap (polls until local)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use call_state::{CallSession, ChangeKey};
//!
//! let session = CallSession::new(engine)?;
//! let store = session.store();
//!
//! store.watch(ChangeKey::ActiveSpeaker);
//! for change in store.changes().try_iter() {
//!     println!("speaker: {:?}", store.active_speaker());
//! }
//!
//! // Fine-grained, referentially stable reads
//! let subscribed = store.participant_property(&id, "tracks.audio.subscribed");
//! ```
//!
//! Reads never fail: before the bootstrap completes, or while no engine is
//! attached, the store simply reports no participants.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod iter;
pub mod logging;
pub mod reconcile;
pub mod resolver;
pub mod selectors;
pub mod session;
pub mod speaker_slots;
pub mod store;

pub use bootstrap::Bootstrap;
pub use config::{CallStateConfig, DEFAULT_SPEAKER_SLOTS};
pub use error::{Result, StateError};
pub use iter::ChangeIterator;
pub use reconcile::{apply_batch, apply_batch_with, apply_event, BatchSummary};
pub use resolver::{resolve_path, resolve_paths, PropertyCache};
pub use selectors::{ParticipantFilter, ParticipantSort};
pub use session::{CallSession, CallSessionBuilder};
pub use speaker_slots::{ParticipantSource, SlotAssignment, SpeakerSlotAllocator, SpeakerSlots};
pub use store::{CallStateStore, ChangeKey, StateChange};

pub use call_api::{CallEvent, EventKind, ParticipantRecord, SessionId, WaitingParticipant};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CallEvent, CallSession, CallStateConfig, CallStateStore, ChangeKey, EventKind,
        ParticipantFilter, ParticipantRecord, ParticipantSort, SessionId, SpeakerSlotAllocator,
        StateError,
    };
}
