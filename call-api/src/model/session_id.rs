//! Participant session identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for one participant's presence in a call instance
///
/// A participant that leaves and rejoins receives a new session id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The engine reports an empty id before the local participant is known
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId::new(s)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        SessionId::new(s)
    }
}
