//! Named filters and sort orders over participant records

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use call_api::ParticipantRecord;

use crate::error::StateError;

type FilterFn = Arc<dyn Fn(&ParticipantRecord) -> bool + Send + Sync>;
type CompareFn = Arc<dyn Fn(&ParticipantRecord, &ParticipantRecord) -> Ordering + Send + Sync>;

/// Predicate applied to participant records
#[derive(Clone)]
pub enum ParticipantFilter {
    Local,
    Remote,
    Owner,
    Recording,
    ScreenSharing,
    Custom(FilterFn),
}

impl ParticipantFilter {
    pub fn custom(predicate: impl Fn(&ParticipantRecord) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, record: &ParticipantRecord) -> bool {
        match self {
            Self::Local => record.local,
            Self::Remote => !record.local,
            Self::Owner => record.owner,
            Self::Recording => record.recording,
            Self::ScreenSharing => record.is_screen_sharing(),
            Self::Custom(predicate) => predicate(record),
        }
    }
}

impl fmt::Debug for ParticipantFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "Local"),
            Self::Remote => write!(f, "Remote"),
            Self::Owner => write!(f, "Owner"),
            Self::Recording => write!(f, "Recording"),
            Self::ScreenSharing => write!(f, "ScreenSharing"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl FromStr for ParticipantFilter {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "owner" => Ok(Self::Owner),
            "recording" => Ok(Self::Recording),
            "screen-sharing" => Ok(Self::ScreenSharing),
            other => Err(StateError::UnknownFilter(other.to_string())),
        }
    }
}

/// Ordering applied to participant records
///
/// Missing optional values sort before present ones.
#[derive(Clone)]
pub enum ParticipantSort {
    JoinedAt,
    SessionId,
    UserId,
    UserName,
    Custom(CompareFn),
}

impl ParticipantSort {
    pub fn custom(
        compare: impl Fn(&ParticipantRecord, &ParticipantRecord) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        Self::Custom(Arc::new(compare))
    }

    pub fn compare(&self, a: &ParticipantRecord, b: &ParticipantRecord) -> Ordering {
        match self {
            Self::JoinedAt => a.joined_at.cmp(&b.joined_at),
            Self::SessionId => a.session_id.cmp(&b.session_id),
            Self::UserId => a.user_id.cmp(&b.user_id),
            Self::UserName => a.user_name.cmp(&b.user_name),
            Self::Custom(compare) => compare(a, b),
        }
    }
}

impl fmt::Debug for ParticipantSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JoinedAt => write!(f, "JoinedAt"),
            Self::SessionId => write!(f, "SessionId"),
            Self::UserId => write!(f, "UserId"),
            Self::UserName => write!(f, "UserName"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl FromStr for ParticipantSort {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "joinedAt" => Ok(Self::JoinedAt),
            "sessionId" => Ok(Self::SessionId),
            "userId" => Ok(Self::UserId),
            "userName" => Ok(Self::UserName),
            other => Err(StateError::UnknownSort(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_api::{TrackInfo, TrackKind};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn sharing(id: &str) -> ParticipantRecord {
        ParticipantRecord::new(id).with_track(TrackKind::ScreenVideo, TrackInfo::playable())
    }

    #[rstest]
    #[case("local", ParticipantRecord::local("me"), true)]
    #[case("local", ParticipantRecord::new("a"), false)]
    #[case("remote", ParticipantRecord::new("a"), true)]
    #[case("owner", ParticipantRecord::new("a").with_owner(true), true)]
    #[case("recording", ParticipantRecord::new("a"), false)]
    #[case("screen-sharing", sharing("a"), true)]
    #[case("screen-sharing", ParticipantRecord::new("a"), false)]
    fn test_named_filters(#[case] name: &str, #[case] record: ParticipantRecord, #[case] expected: bool) {
        let filter: ParticipantFilter = name.parse().unwrap();
        assert_eq!(filter.matches(&record), expected);
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        assert!(matches!(
            "speaking".parse::<ParticipantFilter>(),
            Err(StateError::UnknownFilter(name)) if name == "speaking"
        ));
        assert!(matches!(
            "loudness".parse::<ParticipantSort>(),
            Err(StateError::UnknownSort(name)) if name == "loudness"
        ));
    }

    #[test]
    fn test_joined_at_puts_missing_first() {
        let early = ParticipantRecord::new("a").with_joined_at(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
        let unknown = ParticipantRecord::new("b");

        assert_eq!(ParticipantSort::JoinedAt.compare(&unknown, &early), Ordering::Less);
        assert_eq!(ParticipantSort::JoinedAt.compare(&early, &early), Ordering::Equal);
    }

    #[test]
    fn test_custom_sort() {
        let sort = ParticipantSort::custom(|a, b| b.user_name.cmp(&a.user_name));
        let ann = ParticipantRecord::new("a").with_user_name("Ann");
        let bob = ParticipantRecord::new("b").with_user_name("Bob");
        assert_eq!(sort.compare(&ann, &bob), Ordering::Greater);
    }
}
