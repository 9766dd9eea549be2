//! Configuration for a call-state session

use std::time::Duration;

use crate::error::{Result, StateError};

/// Default number of audio output slots
pub const DEFAULT_SPEAKER_SLOTS: usize = 5;

/// Configuration for [`crate::CallSession`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStateConfig {
    /// Cadence at which buffered engine events are applied
    /// Default: 100 milliseconds
    pub batch_interval: Duration,

    /// Retry interval while waiting for the engine's first participant snapshot
    /// Default: 100 milliseconds
    pub bootstrap_interval: Duration,

    /// Number of concurrent audio output slots
    /// Default: 5
    pub speaker_slots: usize,
}

impl Default for CallStateConfig {
    fn default() -> Self {
        Self {
            batch_interval: Duration::from_millis(100),
            bootstrap_interval: Duration::from_millis(100),
            speaker_slots: DEFAULT_SPEAKER_SLOTS,
        }
    }
}

impl CallStateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorter batching window, trading recompute cost for latency
    pub fn low_latency() -> Self {
        Self {
            batch_interval: Duration::from_millis(25),
            bootstrap_interval: Duration::from_millis(50),
            ..Default::default()
        }
    }

    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval = interval;
        self
    }

    pub fn with_bootstrap_interval(mut self, interval: Duration) -> Self {
        self.bootstrap_interval = interval;
        self
    }

    pub fn with_speaker_slots(mut self, slots: usize) -> Self {
        self.speaker_slots = slots;
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.batch_interval.is_zero() {
            return Err(StateError::Configuration(
                "Batch interval must be greater than 0".to_string(),
            ));
        }

        if self.bootstrap_interval.is_zero() {
            return Err(StateError::Configuration(
                "Bootstrap interval must be greater than 0".to_string(),
            ));
        }

        if self.speaker_slots == 0 {
            return Err(StateError::Configuration(
                "At least one speaker slot is required".to_string(),
            ));
        }

        Ok(())
    }
}
