//! Boundary with the external call engine

use std::fmt;
use std::sync::Arc;

use crate::event::{CallEvent, EventKind};
use crate::model::ParticipantRecord;

/// Physical listener attached to the engine for one event kind
pub type EngineListener = Arc<dyn Fn(&CallEvent) + Send + Sync>;

/// Handle returned by [`CallEngine::on`], used to detach the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// The external call engine as seen by the state core
///
/// Implementations wrap whatever SDK actually runs the call. Only the event bus
/// attaches listeners; everything else goes through the bus.
pub trait CallEngine: Send + Sync {
    /// Attach a listener for `kind`
    fn on(&self, kind: EventKind, listener: EngineListener) -> ListenerId;

    /// Detach a listener previously returned by [`CallEngine::on`]
    fn off(&self, kind: EventKind, id: ListenerId);

    /// Current participant snapshot
    ///
    /// Empty until the engine knows who is in the call. A valid snapshot
    /// contains exactly one record with `local == true` and a non-empty id.
    fn participants(&self) -> Vec<ParticipantRecord>;

    /// True once the engine instance has been torn down
    fn is_destroyed(&self) -> bool;
}
