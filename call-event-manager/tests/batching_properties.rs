//! Property tests for the bus + collector pipeline.
//!
//! Each case runs on a fresh current-thread runtime with a paused clock so
//! timer ticks are deterministic.

use std::sync::Arc;
use std::time::Duration;

use call_api::{CallEvent, EventKind, FakeEngine, SessionId, TrackKind};
use call_event_manager::{BatchCollector, EventBus, DEFAULT_BATCH_INTERVAL};
use parking_lot::Mutex;
use proptest::prelude::*;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

/// Strategy over the three signals the speaker-slot allocator batches together
fn signal_strategy() -> impl Strategy<Value = CallEvent> {
    let id = "[a-e]".prop_map(|s: String| SessionId::new(s));
    prop_oneof![
        id.clone().prop_map(|session_id| CallEvent::ActiveSpeakerChange {
            session_id: Some(session_id)
        }),
        id.clone().prop_map(|session_id| CallEvent::TrackStarted {
            session_id,
            local: false,
            kind: TrackKind::Audio,
        }),
        id.prop_map(|session_id| CallEvent::ParticipantLeft { session_id }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Events fired inside one interval arrive as exactly one batch, in order,
    /// even when they span several kinds.
    #[test]
    fn prop_single_interval_single_ordered_batch(
        events in prop::collection::vec(signal_strategy(), 1..40),
    ) {
        let rt = paused_runtime();
        let batches: Arc<Mutex<Vec<Vec<CallEvent>>>> = Arc::default();

        rt.block_on(async {
            let engine = Arc::new(FakeEngine::new());
            let bus = Arc::new(EventBus::with_engine(engine.clone()));
            let sink = Arc::clone(&batches);
            let _collector = BatchCollector::observe(
                &bus,
                &[EventKind::ActiveSpeakerChange, EventKind::TrackStarted, EventKind::ParticipantLeft],
                DEFAULT_BATCH_INTERVAL,
                move |batch| sink.lock().push(batch),
            )
            .unwrap();

            for event in &events {
                engine.emit(event.clone());
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        });

        let batches = batches.lock();
        prop_assert_eq!(batches.len(), 1);
        prop_assert_eq!(&batches[0], &events);
    }

    /// Whatever the split between timer flushes and the teardown flush, every
    /// event is delivered exactly once and in order.
    #[test]
    fn prop_no_event_lost_or_duplicated(
        events in prop::collection::vec(signal_strategy(), 0..40),
        gaps in prop::collection::vec(0u64..250, 0..40),
    ) {
        let rt = paused_runtime();
        let batches: Arc<Mutex<Vec<Vec<CallEvent>>>> = Arc::default();

        rt.block_on(async {
            let engine = Arc::new(FakeEngine::new());
            let bus = Arc::new(EventBus::with_engine(engine.clone()));
            let sink = Arc::clone(&batches);
            let collector = BatchCollector::observe(
                &bus,
                &[EventKind::ActiveSpeakerChange, EventKind::TrackStarted, EventKind::ParticipantLeft],
                DEFAULT_BATCH_INTERVAL,
                move |batch| sink.lock().push(batch),
            )
            .unwrap();

            for (i, event) in events.iter().enumerate() {
                engine.emit(event.clone());
                if let Some(gap) = gaps.get(i) {
                    tokio::time::sleep(Duration::from_millis(*gap)).await;
                }
            }
            collector.dispose();
        });

        let batches = batches.lock();
        prop_assert!(batches.iter().all(|batch| !batch.is_empty()));
        let flattened: Vec<CallEvent> = batches.iter().flatten().cloned().collect();
        prop_assert_eq!(flattened, events);
    }
}

#[tokio::test(start_paused = true)]
async fn independent_collectors_share_one_engine_listener() {
    let engine = Arc::new(FakeEngine::new());
    let bus = Arc::new(EventBus::with_engine(engine.clone()));
    let first: Arc<Mutex<Vec<Vec<CallEvent>>>> = Arc::default();
    let second: Arc<Mutex<Vec<Vec<CallEvent>>>> = Arc::default();

    let sink = Arc::clone(&first);
    let a = BatchCollector::observe(
        &bus,
        &[EventKind::LeftMeeting],
        Duration::from_millis(100),
        move |batch| sink.lock().push(batch),
    )
    .unwrap();
    let sink = Arc::clone(&second);
    let b = BatchCollector::observe(
        &bus,
        &[EventKind::LeftMeeting],
        Duration::from_millis(250),
        move |batch| sink.lock().push(batch),
    )
    .unwrap();

    assert_eq!(engine.listener_count(EventKind::LeftMeeting), 1);

    engine.emit(CallEvent::LeftMeeting);
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(first.lock().len(), 1);
    assert!(second.lock().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(second.lock().len(), 1);

    a.dispose();
    assert_eq!(engine.listener_count(EventKind::LeftMeeting), 1);
    b.dispose();
    assert_eq!(engine.listener_count(EventKind::LeftMeeting), 0);
}
