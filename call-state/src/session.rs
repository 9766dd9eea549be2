//! Call session wiring
//!
//! [`CallSession`] owns one event bus, the canonical store, the speaker-slot
//! allocator and the batch collectors feeding them. Everything is scoped to
//! the session: dropping it cancels every timer and flushes pending events.

use std::sync::Arc;

use call_api::{CallEngine, EventKind};
use call_event_manager::{BatchCollector, EventBus};
use tracing::{debug, info};

use crate::bootstrap::Bootstrap;
use crate::config::CallStateConfig;
use crate::error::Result;
use crate::reconcile;
use crate::speaker_slots::SpeakerSlotAllocator;
use crate::store::CallStateStore;

/// Everything that moves participants, the active speaker or the speaker slots
///
/// Delivered through one collector so a reset wins over every other event of
/// the same flush, and slot assignment always sees the records reconciled from
/// that flush.
pub const CALL_STATE_EVENTS: &[EventKind] = &[
    EventKind::JoinedMeeting,
    EventKind::ParticipantJoined,
    EventKind::ParticipantUpdated,
    EventKind::ParticipantLeft,
    EventKind::ActiveSpeakerChange,
    EventKind::TrackStarted,
    EventKind::LeftMeeting,
    EventKind::CallInstanceDestroyed,
];

pub const WAITING_ROOM_EVENTS: &[EventKind] = &[
    EventKind::WaitingParticipantAdded,
    EventKind::WaitingParticipantUpdated,
    EventKind::WaitingParticipantRemoved,
];

/// Builder for [`CallSession`]
#[derive(Default)]
pub struct CallSessionBuilder {
    config: CallStateConfig,
    engine: Option<Arc<dyn CallEngine>>,
}

impl CallSessionBuilder {
    pub fn config(mut self, config: CallStateConfig) -> Self {
        self.config = config;
        self
    }

    /// Engine to attach; a session may also start detached
    pub fn engine(mut self, engine: Arc<dyn CallEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Wire the session; must be called inside a Tokio runtime
    pub fn build(self) -> Result<CallSession> {
        self.config.validate()?;
        let config = self.config;

        let bus = Arc::new(EventBus::new());
        let store = CallStateStore::new();
        let allocator = SpeakerSlotAllocator::new(config.speaker_slots, store.clone());

        let call_state = {
            let store = store.clone();
            let slots = allocator.clone();
            BatchCollector::observe(&bus, CALL_STATE_EVENTS, config.batch_interval, move |events| {
                reconcile::apply_batch(&store, &events);
                slots.handle_batch(&events);
            })?
        };

        let waiting_room = {
            let store = store.clone();
            BatchCollector::observe(&bus, WAITING_ROOM_EVENTS, config.batch_interval, move |events| {
                reconcile::apply_batch(&store, &events);
            })?
        };
        let collectors = vec![call_state, waiting_room];

        let bootstrap = Bootstrap::spawn(Arc::clone(&bus), store.clone(), config.bootstrap_interval)?;

        if let Some(engine) = self.engine {
            bus.set_engine(Some(engine));
        }

        info!(
            batch_interval_ms = config.batch_interval.as_millis() as u64,
            speaker_slots = config.speaker_slots,
            "Call session started"
        );

        Ok(CallSession {
            bus,
            store,
            allocator,
            collectors,
            bootstrap,
            config,
        })
    }
}

/// One call's worth of state plumbing
///
/// # Example
///
/// ```rust,ignore
/// let session = CallSession::new(engine)?;
///
/// session.store().watch(ChangeKey::ParticipantIds);
/// for change in session.store().changes() {
///     println!("participants now: {:?}", session.store().participant_ids());
/// }
/// ```
pub struct CallSession {
    bus: Arc<EventBus>,
    store: CallStateStore,
    allocator: SpeakerSlotAllocator,
    collectors: Vec<BatchCollector>,
    bootstrap: Bootstrap,
    config: CallStateConfig,
}

impl CallSession {
    /// Session with default configuration attached to `engine`
    pub fn new(engine: Arc<dyn CallEngine>) -> Result<Self> {
        Self::builder().engine(engine).build()
    }

    pub fn builder() -> CallSessionBuilder {
        CallSessionBuilder::default()
    }

    pub fn store(&self) -> &CallStateStore {
        &self.store
    }

    pub fn allocator(&self) -> &SpeakerSlotAllocator {
        &self.allocator
    }

    /// Snapshot of the speaker slots
    pub fn speaker_slots(&self) -> Vec<Option<call_api::SessionId>> {
        self.allocator.slots()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &CallStateConfig {
        &self.config
    }

    /// Swap the engine; every subscribed event kind is re-attached to the new one
    pub fn replace_engine(&self, engine: Option<Arc<dyn CallEngine>>) {
        debug!(attached = engine.is_some(), "Replacing call engine");
        self.bus.set_engine(engine);
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrap.is_complete()
    }

    /// Cancel polling and flush every collector
    pub fn shutdown(mut self) {
        self.bootstrap.cancel();
        for collector in self.collectors.drain(..) {
            collector.dispose();
        }
        info!("Call session stopped");
    }
}

impl std::fmt::Debug for CallSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSession")
            .field("store", &self.store)
            .field("allocator", &self.allocator)
            .field("bootstrap", &self.bootstrap)
            .field("collectors", &self.collectors.len())
            .finish()
    }
}
