use thiserror::Error;

/// Errors produced when parsing engine-facing identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown event type: {0}")]
    UnknownEventKind(String),

    #[error("Unknown track kind: {0}")]
    UnknownTrackKind(String),

    #[error("Unknown access level: {0}")]
    UnknownAccessLevel(String),
}
