//! Event bus adapter
//!
//! Fans a single physical engine listener per event kind out to any number of
//! in-process subscribers. The engine listener is attached when the first
//! subscriber for a kind registers and removed when the last one leaves, the
//! same reference-counted lifecycle UPnP subscriptions get in an event manager.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use call_api::{CallEngine, CallEvent, EngineListener, EventKind, ListenerId};
use parking_lot::{Mutex, RwLock};

/// In-process handler for one event kind
pub type EventHandler = Arc<dyn Fn(&CallEvent) + Send + Sync>;

/// Identifies one subscriber of one event kind
///
/// Negative keys are priority subscribers and run before non-negative ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberKey(pub i64);

impl SubscriberKey {
    pub fn is_priority(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for SubscriberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct HandlerEntry {
    key: SubscriberKey,
    seq: u64,
    handler: EventHandler,
}

impl HandlerEntry {
    /// Dispatch rank: priority band first, then registration order
    fn rank(&self) -> (bool, u64) {
        (!self.key.is_priority(), self.seq)
    }
}

type HandlerTable = HashMap<EventKind, Vec<HandlerEntry>>;

#[derive(Default)]
struct EngineBinding {
    engine: Option<Arc<dyn CallEngine>>,
    attached: HashMap<EventKind, ListenerId>,
}

/// Registry of event subscribers scoped to one call session
///
/// Construct one per session and share it by `Arc`. Dropping the bus detaches
/// every physical listener it still holds on the engine.
///
/// # Example
///
/// ```rust,ignore
/// let bus = Arc::new(EventBus::new());
/// bus.set_engine(Some(engine));
///
/// bus.register(EventKind::ParticipantLeft, SubscriberKey(1), Arc::new(|event| {
///     println!("left: {:?}", event.session_id());
/// }));
/// ```
pub struct EventBus {
    handlers: Arc<RwLock<HandlerTable>>,
    binding: Mutex<EngineBinding>,
    next_seq: AtomicU64,
    next_key: AtomicI64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            binding: Mutex::new(EngineBinding::default()),
            next_seq: AtomicU64::new(0),
            next_key: AtomicI64::new(1),
        }
    }

    /// Create a bus already bound to an engine
    pub fn with_engine(engine: Arc<dyn CallEngine>) -> Self {
        let bus = Self::new();
        bus.set_engine(Some(engine));
        bus
    }

    /// Generate a fresh, non-priority subscriber key
    pub fn next_key(&self) -> SubscriberKey {
        SubscriberKey(self.next_key.fetch_add(1, Ordering::Relaxed))
    }

    /// Register `handler` for `kind` under `key`
    ///
    /// Returns `false` without changing anything when `(kind, key)` is already
    /// registered.
    pub fn register(&self, kind: EventKind, key: SubscriberKey, handler: EventHandler) -> bool {
        // Held across the table change so attach/detach decisions cannot interleave
        let mut binding = self.binding.lock();
        let first = {
            let mut table = self.handlers.write();
            let list = table.entry(kind).or_default();

            if list.iter().any(|entry| entry.key == key) {
                tracing::debug!(event = %kind, key = %key, "Subscriber already registered");
                return false;
            }

            let entry = HandlerEntry {
                key,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                handler,
            };
            let position = list.partition_point(|existing| existing.rank() <= entry.rank());
            list.insert(position, entry);

            tracing::debug!(
                event = %kind,
                key = %key,
                subscribers = list.len(),
                "Registered subscriber"
            );
            list.len() == 1
        };

        if first {
            self.attach_locked(&mut binding, kind);
        }

        true
    }

    /// Remove the subscriber `key` from `kind`
    ///
    /// Returns whether a subscriber was removed. Removing the last subscriber
    /// of a kind detaches the physical engine listener.
    pub fn unregister(&self, kind: EventKind, key: SubscriberKey) -> bool {
        let mut binding = self.binding.lock();
        let (removed, last) = {
            let mut table = self.handlers.write();
            let Some(list) = table.get_mut(&kind) else {
                return false;
            };

            let before = list.len();
            list.retain(|entry| entry.key != key);
            let removed = list.len() != before;
            let last = list.is_empty();
            if last {
                table.remove(&kind);
            }
            (removed, last)
        };

        if removed {
            tracing::debug!(event = %kind, key = %key, "Unregistered subscriber");
        }

        if last {
            Self::detach_locked(&mut binding, kind);
        }

        removed
    }

    /// Replace the engine instance
    ///
    /// Listeners are removed from the previous engine (unless it reports
    /// destroyed) and every kind that currently has subscribers is attached to
    /// the new one.
    pub fn set_engine(&self, engine: Option<Arc<dyn CallEngine>>) {
        let mut binding = self.binding.lock();

        let kinds: Vec<EventKind> = binding.attached.keys().copied().collect();
        for kind in kinds {
            Self::detach_locked(&mut binding, kind);
        }

        binding.engine = engine;

        let kinds: Vec<EventKind> = self
            .handlers
            .read()
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(kind, _)| *kind)
            .collect();
        for kind in kinds {
            self.attach_locked(&mut binding, kind);
        }

        tracing::debug!(
            attached = binding.attached.len(),
            has_engine = binding.engine.is_some(),
            "Engine binding updated"
        );
    }

    /// The engine currently bound, if any
    pub fn engine(&self) -> Option<Arc<dyn CallEngine>> {
        self.binding.lock().engine.clone()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Whether a physical listener for `kind` is attached to the engine
    pub fn is_attached(&self, kind: EventKind) -> bool {
        self.binding.lock().attached.contains_key(&kind)
    }

    /// Deliver an event to the subscribers of its kind
    ///
    /// This is what the physical listener calls; exposed for engines that push
    /// events through the bus directly.
    pub fn dispatch(&self, event: &CallEvent) {
        dispatch_to(&self.handlers, event);
    }

    fn attach_locked(&self, binding: &mut EngineBinding, kind: EventKind) {
        if binding.attached.contains_key(&kind) {
            return;
        }
        let Some(engine) = binding.engine.clone() else {
            tracing::trace!(event = %kind, "No engine bound, deferring listener attach");
            return;
        };
        if engine.is_destroyed() {
            tracing::debug!(event = %kind, "Engine destroyed, not attaching listener");
            return;
        }

        let id = engine.on(kind, physical_listener(Arc::downgrade(&self.handlers)));
        binding.attached.insert(kind, id);
        tracing::debug!(event = %kind, listener = %id, "Attached engine listener");
    }

    fn detach_locked(binding: &mut EngineBinding, kind: EventKind) {
        let Some(id) = binding.attached.remove(&kind) else {
            return;
        };
        match &binding.engine {
            Some(engine) if !engine.is_destroyed() => {
                engine.off(kind, id);
                tracing::debug!(event = %kind, listener = %id, "Detached engine listener");
            }
            _ => {
                tracing::debug!(event = %kind, "Engine gone, dropping listener handle");
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        let binding = self.binding.get_mut();
        let kinds: Vec<EventKind> = binding.attached.keys().copied().collect();
        for kind in kinds {
            Self::detach_locked(binding, kind);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attached = self.binding.lock().attached.len();
        let kinds = self.handlers.read().len();
        f.debug_struct("EventBus")
            .field("kinds", &kinds)
            .field("attached", &attached)
            .finish()
    }
}

fn physical_listener(handlers: Weak<RwLock<HandlerTable>>) -> EngineListener {
    Arc::new(move |event: &CallEvent| {
        if let Some(handlers) = handlers.upgrade() {
            dispatch_to(&handlers, event);
        }
    })
}

/// Snapshot the handler list, then call each handler with no lock held
fn dispatch_to(handlers: &RwLock<HandlerTable>, event: &CallEvent) {
    let snapshot: Vec<EventHandler> = handlers
        .read()
        .get(&event.kind())
        .map(|list| list.iter().map(|entry| Arc::clone(&entry.handler)).collect())
        .unwrap_or_default();

    for handler in snapshot {
        handler(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_api::{FakeEngine, SessionId};

    fn left(id: &str) -> CallEvent {
        CallEvent::ParticipantLeft {
            session_id: SessionId::new(id),
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<i64>>>, tag: i64) -> EventHandler {
        let log = Arc::clone(log);
        Arc::new(move |_| log.lock().push(tag))
    }

    #[test]
    fn test_single_physical_listener_per_kind() {
        let engine = Arc::new(FakeEngine::new());
        let bus = EventBus::with_engine(engine.clone());
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.register(EventKind::ParticipantLeft, SubscriberKey(1), recorder(&log, 1));
        bus.register(EventKind::ParticipantLeft, SubscriberKey(2), recorder(&log, 2));
        bus.register(EventKind::ParticipantLeft, SubscriberKey(3), recorder(&log, 3));

        assert_eq!(engine.listener_count(EventKind::ParticipantLeft), 1);
        assert_eq!(bus.subscriber_count(EventKind::ParticipantLeft), 3);

        engine.emit(left("a"));
        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_registration_is_noop() {
        let engine = Arc::new(FakeEngine::new());
        let bus = EventBus::with_engine(engine.clone());
        let log = Arc::new(Mutex::new(Vec::new()));

        assert!(bus.register(EventKind::ParticipantLeft, SubscriberKey(7), recorder(&log, 1)));
        assert!(!bus.register(EventKind::ParticipantLeft, SubscriberKey(7), recorder(&log, 2)));

        engine.emit(left("a"));
        assert_eq!(*log.lock(), vec![1]);
    }

    #[test]
    fn test_priority_keys_run_first_in_registration_order() {
        let engine = Arc::new(FakeEngine::new());
        let bus = EventBus::with_engine(engine.clone());
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.register(EventKind::ParticipantLeft, SubscriberKey(5), recorder(&log, 5));
        bus.register(EventKind::ParticipantLeft, SubscriberKey(-1), recorder(&log, -1));
        bus.register(EventKind::ParticipantLeft, SubscriberKey(2), recorder(&log, 2));
        bus.register(EventKind::ParticipantLeft, SubscriberKey(-9), recorder(&log, -9));

        engine.emit(left("a"));
        assert_eq!(*log.lock(), vec![-1, -9, 5, 2]);
    }

    #[test]
    fn test_last_unregister_detaches_listener() {
        let engine = Arc::new(FakeEngine::new());
        let bus = EventBus::with_engine(engine.clone());

        bus.register(EventKind::LeftMeeting, SubscriberKey(1), Arc::new(|_| {}));
        bus.register(EventKind::LeftMeeting, SubscriberKey(2), Arc::new(|_| {}));

        assert!(bus.unregister(EventKind::LeftMeeting, SubscriberKey(1)));
        assert!(bus.is_attached(EventKind::LeftMeeting));
        assert_eq!(engine.listener_count(EventKind::LeftMeeting), 1);

        assert!(bus.unregister(EventKind::LeftMeeting, SubscriberKey(2)));
        assert!(!bus.is_attached(EventKind::LeftMeeting));
        assert_eq!(engine.listener_count(EventKind::LeftMeeting), 0);

        assert!(!bus.unregister(EventKind::LeftMeeting, SubscriberKey(2)));
    }

    #[test]
    fn test_replacing_engine_reattaches_registered_kinds() {
        let first = Arc::new(FakeEngine::new());
        let second = Arc::new(FakeEngine::new());
        let bus = EventBus::with_engine(first.clone());
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.register(EventKind::ParticipantLeft, SubscriberKey(1), recorder(&log, 1));
        bus.register(EventKind::LeftMeeting, SubscriberKey(1), recorder(&log, 10));

        bus.set_engine(Some(second.clone()));

        assert_eq!(first.total_listener_count(), 0);
        assert_eq!(second.listener_count(EventKind::ParticipantLeft), 1);
        assert_eq!(second.listener_count(EventKind::LeftMeeting), 1);

        first.emit(left("a"));
        second.emit(CallEvent::LeftMeeting);
        assert_eq!(*log.lock(), vec![10]);
    }

    #[test]
    fn test_registration_before_engine_attaches_later() {
        let bus = EventBus::new();
        bus.register(EventKind::TrackStarted, SubscriberKey(1), Arc::new(|_| {}));
        assert!(!bus.is_attached(EventKind::TrackStarted));

        let engine = Arc::new(FakeEngine::new());
        bus.set_engine(Some(engine.clone()));
        assert!(bus.is_attached(EventKind::TrackStarted));
        assert_eq!(engine.listener_count(EventKind::TrackStarted), 1);
    }

    #[test]
    fn test_destroyed_engine_is_left_alone() {
        let engine = Arc::new(FakeEngine::new());
        let bus = EventBus::with_engine(engine.clone());
        bus.register(EventKind::ParticipantLeft, SubscriberKey(1), Arc::new(|_| {}));

        engine.destroy();
        bus.unregister(EventKind::ParticipantLeft, SubscriberKey(1));

        // off() was not called on the torn-down instance
        assert_eq!(engine.listener_count(EventKind::ParticipantLeft), 1);
        assert!(!bus.is_attached(EventKind::ParticipantLeft));

        bus.register(EventKind::LeftMeeting, SubscriberKey(1), Arc::new(|_| {}));
        assert_eq!(engine.listener_count(EventKind::LeftMeeting), 0);
    }

    #[test]
    fn test_handler_may_unregister_itself() {
        let engine = Arc::new(FakeEngine::new());
        let bus = Arc::new(EventBus::with_engine(engine.clone()));
        let calls = Arc::new(Mutex::new(0));

        let weak_bus = Arc::downgrade(&bus);
        let counter = Arc::clone(&calls);
        bus.register(
            EventKind::ParticipantLeft,
            SubscriberKey(1),
            Arc::new(move |_| {
                *counter.lock() += 1;
                if let Some(bus) = weak_bus.upgrade() {
                    bus.unregister(EventKind::ParticipantLeft, SubscriberKey(1));
                }
            }),
        );

        engine.emit(left("a"));
        engine.emit(left("b"));
        assert_eq!(*calls.lock(), 1);
        assert_eq!(engine.listener_count(EventKind::ParticipantLeft), 0);
    }

    #[test]
    fn test_drop_detaches_everything() {
        let engine = Arc::new(FakeEngine::new());
        {
            let bus = EventBus::with_engine(engine.clone());
            bus.register(EventKind::ParticipantJoined, SubscriberKey(1), Arc::new(|_| {}));
            bus.register(EventKind::ParticipantLeft, SubscriberKey(1), Arc::new(|_| {}));
            assert_eq!(engine.total_listener_count(), 2);
        }
        assert_eq!(engine.total_listener_count(), 0);
    }

    #[test]
    fn test_generated_keys_are_unique_and_not_priority() {
        let bus = EventBus::new();
        let a = bus.next_key();
        let b = bus.next_key();
        assert_ne!(a, b);
        assert!(!a.is_priority());
        assert!(!b.is_priority());
    }

    #[test]
    fn test_concurrent_register_and_unregister_keep_listener_in_step() {
        let engine = Arc::new(FakeEngine::new());
        let bus = Arc::new(EventBus::with_engine(engine.clone()));
        let kind = EventKind::ParticipantLeft;

        let workers: Vec<_> = (1..=4)
            .map(|n| {
                let bus = Arc::clone(&bus);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        bus.register(kind, SubscriberKey(n), Arc::new(|_| {}));
                        bus.unregister(kind, SubscriberKey(n));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(bus.subscriber_count(kind), 0);
        assert_eq!(engine.listener_count(kind), 0);
        assert!(!bus.is_attached(kind));

        bus.register(kind, SubscriberKey(9), Arc::new(|_| {}));
        assert_eq!(engine.listener_count(kind), 1);
        assert!(bus.is_attached(kind));
    }
}
