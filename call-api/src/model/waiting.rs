//! Waiting-room participants

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Access level a waiting participant is asking for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    None,
    Viewer,
    #[default]
    Full,
    Lobby,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::None => "none",
            AccessLevel::Viewer => "viewer",
            AccessLevel::Full => "full",
            AccessLevel::Lobby => "lobby",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AccessLevel::None),
            "viewer" => Ok(AccessLevel::Viewer),
            "full" => Ok(AccessLevel::Full),
            "lobby" => Ok(AccessLevel::Lobby),
            other => Err(ParseError::UnknownAccessLevel(other.to_string())),
        }
    }
}

/// A participant waiting to be admitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingParticipant {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub awaiting_access: AccessLevel,
}

impl WaitingParticipant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, awaiting_access: AccessLevel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            awaiting_access,
        }
    }
}
