use thiserror::Error;

/// Errors that can occur in the event manager
#[derive(Error, Debug)]
pub enum EventManagerError {
    /// Batch timers need a Tokio runtime to run on
    #[error("No Tokio runtime available to drive the batch timer")]
    NoRuntime,

    /// Flush interval must be non-zero
    #[error("Batch interval must be greater than zero")]
    ZeroInterval,

    /// A collector was asked to observe nothing
    #[error("A batch collector needs at least one event kind")]
    NoEventKinds,
}

/// Result type for event manager operations
pub type Result<T> = std::result::Result<T, EventManagerError>;
