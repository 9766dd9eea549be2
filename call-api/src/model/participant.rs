//! Participant record

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session_id::SessionId;
use super::track::{TrackInfo, TrackKind, Tracks};

/// Administrative capability a participant may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdminScope {
    Participants,
    Streaming,
    Transcription,
}

/// Participant permissions
///
/// Set-typed fields compare by membership, so two payloads listing the same
/// kinds in a different order are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    #[serde(default = "default_presence")]
    pub has_presence: bool,
    #[serde(default)]
    pub can_send: BTreeSet<TrackKind>,
    #[serde(default)]
    pub can_admin: BTreeSet<AdminScope>,
}

fn default_presence() -> bool {
    true
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            has_presence: true,
            can_send: TrackKind::ALL.into_iter().collect(),
            can_admin: BTreeSet::new(),
        }
    }
}

/// One participant as known to the canonical store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub owner: bool,
    #[serde(default)]
    pub recording: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tracks: Tracks,
    #[serde(default)]
    pub permissions: Permissions,
    /// Last time this participant was the active speaker.
    ///
    /// Owned by the reconciler; engine payloads never carry it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

impl ParticipantRecord {
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            user_name: String::new(),
            local: false,
            owner: false,
            recording: false,
            joined_at: None,
            tracks: Tracks::default(),
            permissions: Permissions::default(),
            last_active: None,
        }
    }

    /// Local participant record
    pub fn local(session_id: impl Into<SessionId>) -> Self {
        Self {
            local: true,
            ..Self::new(session_id)
        }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_joined_at(mut self, joined_at: DateTime<Utc>) -> Self {
        self.joined_at = Some(joined_at);
        self
    }

    pub fn with_track(mut self, kind: TrackKind, info: TrackInfo) -> Self {
        *self.tracks.get_mut(kind) = info;
        self
    }

    pub fn with_last_active(mut self, at: DateTime<Utc>) -> Self {
        self.last_active = Some(at);
        self
    }

    pub fn with_owner(mut self, owner: bool) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_recording(mut self, recording: bool) -> Self {
        self.recording = recording;
        self
    }

    pub fn audio(&self) -> &TrackInfo {
        &self.tracks.audio
    }

    /// Sharing either screen track
    pub fn is_screen_sharing(&self) -> bool {
        self.tracks.screen_video.state.is_live() || self.tracks.screen_audio.state.is_live()
    }

    /// Shallow merge of an update payload over an existing record
    ///
    /// Every payload field replaces the previous one. `last_active` is not part
    /// of engine payloads, so the previous value survives unless the payload
    /// explicitly carries one.
    pub fn merge(prev: &ParticipantRecord, incoming: ParticipantRecord) -> ParticipantRecord {
        let last_active = incoming.last_active.or(prev.last_active);
        ParticipantRecord {
            last_active,
            ..incoming
        }
    }

    /// Render the record as a JSON tree for path resolution
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Subscription, TrackState};
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_reconciler_last_active() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let prev = ParticipantRecord::new("a")
            .with_user_name("Ada")
            .with_last_active(at);
        let incoming = ParticipantRecord::new("a").with_user_name("Ada L.");

        let merged = ParticipantRecord::merge(&prev, incoming);
        assert_eq!(merged.user_name, "Ada L.");
        assert_eq!(merged.last_active, Some(at));
    }

    #[test]
    fn test_permissions_compare_by_membership() {
        let mut a = Permissions::default();
        a.can_send = [TrackKind::Video, TrackKind::Audio].into_iter().collect();
        let mut b = Permissions::default();
        b.can_send = [TrackKind::Audio, TrackKind::Video].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_timestamps_compare_by_instant() {
        let utc = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let parsed: DateTime<Utc> = DateTime::parse_from_rfc3339("2024-05-01T14:00:00+02:00")
            .unwrap()
            .with_timezone(&Utc);
        let a = ParticipantRecord::new("a").with_joined_at(utc);
        let b = ParticipantRecord::new("a").with_joined_at(parsed);
        assert_eq!(a, b);
    }

    #[test]
    fn test_to_value_uses_camel_case_paths() {
        let record = ParticipantRecord::new("a").with_track(
            TrackKind::Audio,
            TrackInfo::new(TrackState::Playable, Subscription::Staged),
        );
        let value = record.to_value();
        assert_eq!(value["sessionId"], json!("a"));
        assert_eq!(value["tracks"]["audio"]["subscribed"], json!("staged"));
        assert!(value.get("lastActive").is_none());
    }

    #[test]
    fn test_deserialize_minimal_payload() {
        let record: ParticipantRecord =
            serde_json::from_value(json!({ "sessionId": "b", "local": true })).unwrap();
        assert!(record.local);
        assert_eq!(record.tracks.audio.state, TrackState::Off);
        assert!(record.permissions.has_presence);
    }

    #[test]
    fn test_screen_sharing() {
        let sharing = ParticipantRecord::new("s").with_track(TrackKind::ScreenVideo, TrackInfo::playable());
        assert!(sharing.is_screen_sharing());
        assert!(!ParticipantRecord::new("n").is_screen_sharing());
    }
}
