//! Throttled batch collector
//!
//! Buffers events of one or more kinds and hands them to a single callback on
//! a fixed cadence. Bursts between two ticks become one ordered batch.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use call_api::{CallEvent, EventKind};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::bus::{EventBus, SubscriberKey};
use crate::error::{EventManagerError, Result};

/// Default flush cadence
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_millis(100);

type BatchHandler = Box<dyn FnMut(Vec<CallEvent>) + Send>;

struct Shared {
    buffer: Mutex<Vec<CallEvent>>,
    /// `None` while a flush is running
    on_batch: Mutex<Option<BatchHandler>>,
}

impl Shared {
    /// Hand the whole buffer to the callback; never calls it with an empty batch
    ///
    /// Only one flush runs the callback at a time. A flush that finds the
    /// callback checked out returns immediately; the running flush keeps
    /// draining until the buffer is empty, so nothing is left behind. The
    /// callback is called with no lock held and may dispose its own collector.
    fn flush(&self) -> usize {
        let Some(mut on_batch) = self.on_batch.lock().take() else {
            return 0;
        };

        let mut flushed = 0;
        loop {
            let batch = std::mem::take(&mut *self.buffer.lock());
            if batch.is_empty() {
                break;
            }
            flushed += batch.len();
            on_batch(batch);
        }

        *self.on_batch.lock() = Some(on_batch);
        flushed
    }
}

/// Live batching subscription
///
/// Created by [`BatchCollector::observe`]. Dropping it (or calling
/// [`BatchCollector::dispose`]) cancels the timer, unregisters from the bus and
/// synchronously flushes whatever is still buffered.
///
/// # Example
///
/// ```rust,ignore
/// let collector = BatchCollector::observe(
///     &bus,
///     &[EventKind::ParticipantJoined, EventKind::ParticipantLeft],
///     DEFAULT_BATCH_INTERVAL,
///     move |events| store.apply_batch(&events),
/// )?;
/// ```
pub struct BatchCollector {
    bus: Arc<EventBus>,
    kinds: Vec<EventKind>,
    key: SubscriberKey,
    interval: Duration,
    shared: Arc<Shared>,
    timer: Option<JoinHandle<()>>,
}

impl BatchCollector {
    /// Start collecting `kinds` and flushing them to `on_batch` every `interval`
    ///
    /// Must be called from within a Tokio runtime; the flush timer runs as a
    /// task on it.
    pub fn observe<F>(
        bus: &Arc<EventBus>,
        kinds: &[EventKind],
        interval: Duration,
        on_batch: F,
    ) -> Result<Self>
    where
        F: FnMut(Vec<CallEvent>) + Send + 'static,
    {
        if kinds.is_empty() {
            return Err(EventManagerError::NoEventKinds);
        }
        if interval.is_zero() {
            return Err(EventManagerError::ZeroInterval);
        }
        let runtime = Handle::try_current().map_err(|_| EventManagerError::NoRuntime)?;

        let mut unique: Vec<EventKind> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if !unique.contains(kind) {
                unique.push(*kind);
            }
        }

        let shared = Arc::new(Shared {
            buffer: Mutex::new(Vec::new()),
            on_batch: Mutex::new(Some(Box::new(on_batch))),
        });

        let key = bus.next_key();
        for kind in &unique {
            let sink = Arc::clone(&shared);
            bus.register(
                *kind,
                key,
                Arc::new(move |event: &CallEvent| sink.buffer.lock().push(event.clone())),
            );
        }

        let first_tick = Instant::now() + interval;
        let timer = runtime.spawn(flush_loop(Arc::downgrade(&shared), first_tick, interval));

        tracing::debug!(
            key = %key,
            kinds = ?unique,
            interval_ms = interval.as_millis() as u64,
            "Batch collector started"
        );

        Ok(Self {
            bus: Arc::clone(bus),
            kinds: unique,
            key,
            interval,
            shared,
            timer: Some(timer),
        })
    }

    /// Stop collecting, flushing buffered events exactly once
    pub fn dispose(mut self) {
        self.shutdown();
    }

    /// Number of events waiting for the next flush
    pub fn pending(&self) -> usize {
        self.shared.buffer.lock().len()
    }

    pub fn kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }

    fn shutdown(&mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };
        timer.abort();

        // Unregister before the final flush so nothing lands in the buffer after it
        for kind in &self.kinds {
            self.bus.unregister(*kind, self.key);
        }

        let flushed = self.shared.flush();
        tracing::debug!(key = %self.key, flushed, "Batch collector stopped");
    }
}

impl Drop for BatchCollector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for BatchCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchCollector")
            .field("key", &self.key)
            .field("kinds", &self.kinds)
            .field("interval", &self.interval)
            .field("pending", &self.pending())
            .finish()
    }
}

async fn flush_loop(shared: Weak<Shared>, first_tick: Instant, interval: Duration) {
    let mut ticker = tokio::time::interval_at(first_tick, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let flushed = shared.flush();
        if flushed > 0 {
            tracing::trace!(flushed, "Flushed event batch");
        }
    }
}
