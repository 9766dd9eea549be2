//! Media track types

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

/// Media kind discriminator carried by track events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackKind {
    Audio,
    Video,
    ScreenAudio,
    ScreenVideo,
}

impl TrackKind {
    pub const ALL: [TrackKind; 4] = [
        TrackKind::Audio,
        TrackKind::Video,
        TrackKind::ScreenAudio,
        TrackKind::ScreenVideo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
            TrackKind::ScreenAudio => "screenAudio",
            TrackKind::ScreenVideo => "screenVideo",
        }
    }

    pub fn is_screen(&self) -> bool {
        matches!(self, TrackKind::ScreenAudio | TrackKind::ScreenVideo)
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseError::UnknownTrackKind(s.to_string()))
    }
}

/// Playback state of a single track as reported by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Playable,
    Sendable,
    #[default]
    Off,
    Blocked,
    Interrupted,
}

impl TrackState {
    /// True when media is flowing (or ready to flow) on this track
    pub fn is_live(&self) -> bool {
        matches!(self, TrackState::Playable | TrackState::Sendable)
    }

    /// Off and blocked tracks count as muted for slot eviction
    pub fn is_muted(&self) -> bool {
        matches!(self, TrackState::Off | TrackState::Blocked)
    }
}

/// Subscription status of a remote track
///
/// On the wire this is `true`, `false` or the string `"staged"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Subscription {
    Subscribed,
    #[default]
    Unsubscribed,
    Staged,
}

impl Subscription {
    /// Anything other than an explicit `false` counts as subscribed
    pub fn is_subscribed(&self) -> bool {
        !matches!(self, Subscription::Unsubscribed)
    }
}

impl Serialize for Subscription {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Subscription::Subscribed => serializer.serialize_bool(true),
            Subscription::Unsubscribed => serializer.serialize_bool(false),
            Subscription::Staged => serializer.serialize_str("staged"),
        }
    }
}

impl<'de> Deserialize<'de> for Subscription {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(Subscription::Subscribed),
            Raw::Flag(false) => Ok(Subscription::Unsubscribed),
            Raw::Text(text) if text == "staged" => Ok(Subscription::Staged),
            Raw::Text(other) => Err(serde::de::Error::custom(format!(
                "invalid subscription value: {other}"
            ))),
        }
    }
}

/// State of one media track on a participant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    #[serde(default)]
    pub state: TrackState,
    #[serde(default)]
    pub subscribed: Subscription,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
}

impl TrackInfo {
    pub fn new(state: TrackState, subscribed: Subscription) -> Self {
        Self {
            state,
            subscribed,
            blocked_reason: None,
        }
    }

    pub fn playable() -> Self {
        Self::new(TrackState::Playable, Subscription::Subscribed)
    }

    pub fn off() -> Self {
        Self::default()
    }
}

/// Per-kind track map of a participant
///
/// The four well-known kinds are fixed fields; engines may attach further
/// named tracks which land in `custom`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracks {
    #[serde(default)]
    pub audio: TrackInfo,
    #[serde(default)]
    pub video: TrackInfo,
    #[serde(default)]
    pub screen_audio: TrackInfo,
    #[serde(default)]
    pub screen_video: TrackInfo,
    #[serde(flatten)]
    pub custom: BTreeMap<String, TrackInfo>,
}

impl Tracks {
    pub fn get(&self, kind: TrackKind) -> &TrackInfo {
        match kind {
            TrackKind::Audio => &self.audio,
            TrackKind::Video => &self.video,
            TrackKind::ScreenAudio => &self.screen_audio,
            TrackKind::ScreenVideo => &self.screen_video,
        }
    }

    pub fn get_mut(&mut self, kind: TrackKind) -> &mut TrackInfo {
        match kind {
            TrackKind::Audio => &mut self.audio,
            TrackKind::Video => &mut self.video,
            TrackKind::ScreenAudio => &mut self.screen_audio,
            TrackKind::ScreenVideo => &mut self.screen_video,
        }
    }

    pub fn with(mut self, kind: TrackKind, info: TrackInfo) -> Self {
        *self.get_mut(kind) = info;
        self
    }
}
