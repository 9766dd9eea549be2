//! # Call Event Manager
//!
//! Event plumbing between a call engine and the state core.
//!
//! ## Overview
//!
//! - [`EventBus`]: a per-session registry that keeps **exactly one** physical
//!   listener on the engine per event kind, no matter how many in-process
//!   subscribers there are, and fans events out in a deterministic order.
//! - [`BatchCollector`]: buffers events of chosen kinds and flushes them as one
//!   ordered batch per tick (100ms by default), with a guaranteed flush on
//!   teardown.
//!
//! ## Architecture
//!
//! ```text
//! CallEngine ──(1 listener / kind)──► EventBus ──► handlers (priority, then FIFO)
//!                                                    │
//!                                                    └─► BatchCollector buffer
//!                                                           │ every interval
//!                                                           ▼
//!                                                       on_batch(Vec<CallEvent>)
//! ```
//!
//! Listener attachment follows a reference-counted lifecycle: the engine
//! listener is created for the first subscriber of a kind and removed with the
//! last one.

pub mod bus;
pub mod collector;
pub mod error;

pub use bus::{EventBus, EventHandler, SubscriberKey};
pub use collector::{BatchCollector, DEFAULT_BATCH_INTERVAL};
pub use error::{EventManagerError, Result};

pub use call_api::{CallEvent, EventKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BatchCollector, CallEvent, EventBus, EventHandler, EventKind, EventManagerError, Result,
        SubscriberKey, DEFAULT_BATCH_INTERVAL,
    };
}
