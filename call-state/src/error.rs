//! Error types for call-state

use call_event_manager::EventManagerError;
use thiserror::Error;

/// Result type for call-state operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that can occur while setting up or querying call state
///
/// Event reconciliation itself never fails: anomalies in the event stream are
/// logged and absorbed.
#[derive(Error, Debug)]
pub enum StateError {
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Failure wiring the event bus or a batch collector
    #[error("Event manager error: {0}")]
    EventManager(#[from] EventManagerError),

    /// Unknown named participant filter
    #[error("Unknown participant filter: {0}")]
    UnknownFilter(String),

    /// Unknown named participant sort
    #[error("Unknown participant sort: {0}")]
    UnknownSort(String),
}
