//! Initial participant load
//!
//! Right after a session starts the store is empty. [`Bootstrap`] polls the
//! engine's participant snapshot on a fixed interval until it reports a local
//! participant, loads the snapshot into the store in one step, then stops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use call_api::ParticipantRecord;
use call_event_manager::{EventBus, EventManagerError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::Result;
use crate::store::CallStateStore;

/// Cancellable polling task populating the store
pub struct Bootstrap {
    shutdown_signal: Arc<AtomicBool>,
    complete: Arc<AtomicBool>,
    task_handle: Option<JoinHandle<()>>,
}

impl Bootstrap {
    /// Start polling the bus's current engine every `interval`
    ///
    /// The first poll happens immediately. Polls are skipped while no engine is
    /// attached or the engine reports destroyed; polling never gives up on its
    /// own.
    pub fn spawn(bus: Arc<EventBus>, store: CallStateStore, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(EventManagerError::ZeroInterval.into());
        }
        let handle = Handle::try_current().map_err(|_| EventManagerError::NoRuntime)?;

        let shutdown_signal = Arc::new(AtomicBool::new(false));
        let complete = Arc::new(AtomicBool::new(false));

        let task_shutdown_signal = Arc::clone(&shutdown_signal);
        let task_complete = Arc::clone(&complete);
        let task_handle = handle.spawn(async move {
            Self::polling_loop(bus, store, interval, task_shutdown_signal, task_complete).await;
        });

        Ok(Self {
            shutdown_signal,
            complete,
            task_handle: Some(task_handle),
        })
    }

    async fn polling_loop(
        bus: Arc<EventBus>,
        store: CallStateStore,
        interval: Duration,
        shutdown_signal: Arc<AtomicBool>,
        complete: Arc<AtomicBool>,
    ) {
        let mut attempts: u64 = 0;
        loop {
            if shutdown_signal.load(Ordering::Relaxed) {
                debug!(attempts, "Bootstrap cancelled");
                return;
            }

            if store.local_session_id().is_some() {
                debug!(attempts, "Local participant already known, bootstrap not needed");
                complete.store(true, Ordering::Relaxed);
                return;
            }

            attempts += 1;
            if let Some(snapshot) = Self::poll(&bus) {
                let count = snapshot.len();
                store.init_participants(snapshot);
                complete.store(true, Ordering::Relaxed);
                debug!(attempts, participants = count, "Bootstrap complete");
                return;
            }

            tokio::time::sleep(interval).await;
        }
    }

    /// One snapshot query; `Some` only when it names a local participant
    fn poll(bus: &EventBus) -> Option<Vec<ParticipantRecord>> {
        let engine = bus.engine()?;
        if engine.is_destroyed() {
            trace!("Engine destroyed, skipping bootstrap poll");
            return None;
        }

        let snapshot = engine.participants();
        let has_local = snapshot
            .iter()
            .any(|record| record.local && !record.session_id.is_empty());
        if !has_local {
            trace!(participants = snapshot.len(), "Snapshot has no local participant yet");
            return None;
        }
        Some(snapshot)
    }

    /// Whether the store has been populated
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Relaxed)
    }

    /// Whether polling is still in progress
    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Stop polling; idempotent
    pub fn cancel(&mut self) {
        self.shutdown_signal.store(true, Ordering::Relaxed);
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Bootstrap {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("complete", &self.is_complete())
            .field("running", &self.is_running())
            .finish()
    }
}
