//! # Call API
//!
//! Typed model and engine boundary for a multi-party call.
//!
//! The call engine is an external collaborator: it emits a stream of lifecycle
//! events (participants joining and leaving, tracks starting, speaker changes)
//! and answers a couple of synchronous queries. This crate gives those events a
//! closed, exhaustively matchable shape and defines the [`CallEngine`] trait the
//! rest of the SDK talks to.
//!
//! ```text
//! CallEngine ──on(kind)──► listener(&CallEvent)
//!     │
//!     ├── participants()   snapshot used for bootstrap
//!     └── is_destroyed()   guard before attaching/removing listeners
//! ```
//!
//! # Example
//!
//! ```rust
//! use call_api::{CallEvent, EventKind, SessionId};
//!
//! let event = CallEvent::ParticipantLeft { session_id: SessionId::new("a") };
//! assert_eq!(event.kind(), EventKind::ParticipantLeft);
//! assert_eq!(event.kind().as_str(), "participant-left");
//! ```

pub mod engine;
pub mod error;
pub mod event;
pub mod model;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use engine::{CallEngine, EngineListener, ListenerId};
pub use error::ParseError;
pub use event::{CallEvent, EventKind};
pub use model::{
    AccessLevel, AdminScope, ParticipantRecord, Permissions, SessionId, Subscription, TrackInfo,
    TrackKind, TrackState, Tracks, WaitingParticipant,
};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEngine;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::engine::{CallEngine, EngineListener, ListenerId};
    pub use crate::event::{CallEvent, EventKind};
    pub use crate::model::{
        ParticipantRecord, SessionId, Subscription, TrackKind, TrackState, WaitingParticipant,
    };
}
