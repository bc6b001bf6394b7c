//! Public display read model.
//!
//! Display screens authenticate with a bearer token and see a sanitized copy
//! of the live dashboard: student name, class name, time, status, and tap
//! kind. Nothing else leaves through this path, so every public type here is
//! built from the dashboard types by an explicit transform rather than by
//! serializing the dashboard types with fields skipped.

use chrono::NaiveDate;
use serde::Serialize;

use crate::attendance::{AttendanceStatus, TapKind};
use crate::realtime::{AttendanceStats, HubEvent, HubEventKind, LeaderboardEntry, LiveFeedEntry};
use crate::types::Timestamp;

/// Feed entries shown on a public display.
pub const PUBLIC_FEED_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// Token validity
// ---------------------------------------------------------------------------

/// Why a display token was refused. Logged, never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    Unknown,
    Inactive,
    Expired,
}

impl TokenRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::Unknown => "unknown",
            Self::Inactive => "inactive",
            Self::Expired => "expired",
        }
    }
}

/// Check a stored token's flags against `now`.
pub fn check_token(
    is_active: bool,
    expires_at: Option<Timestamp>,
    now: Timestamp,
) -> Result<(), TokenRejection> {
    if !is_active {
        return Err(TokenRejection::Inactive);
    }
    match expires_at {
        Some(expiry) if now >= expiry => Err(TokenRejection::Expired),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicFeedEntry {
    pub student_name: String,
    pub class_name: String,
    pub time: Timestamp,
    pub status: AttendanceStatus,
    #[serde(rename = "type")]
    pub kind: TapKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicLeaderboardEntry {
    pub rank: i32,
    pub student_name: String,
    pub class_name: String,
    pub arrival_time: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicStats {
    pub total_students: i64,
    pub present: i64,
    pub late: i64,
    pub very_late: i64,
    pub absent: i64,
    pub percentage: f64,
}

/// Hub event as forwarded to public viewers. Carries no tenant id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicEvent {
    #[serde(rename = "type")]
    pub kind: HubEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance: Option<PublicFeedEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<PublicStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard: Option<Vec<PublicLeaderboardEntry>>,
}

/// Full display snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicSnapshot {
    pub school_name: String,
    pub current_time: Timestamp,
    /// Human-readable local date, e.g. "Monday, 2 March 2026".
    pub date: String,
    pub stats: PublicStats,
    pub live_feed: Vec<PublicFeedEntry>,
    pub leaderboard: Vec<PublicLeaderboardEntry>,
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

impl From<&LiveFeedEntry> for PublicFeedEntry {
    fn from(entry: &LiveFeedEntry) -> Self {
        Self {
            student_name: entry.student_name.clone(),
            class_name: entry.class_name.clone().unwrap_or_default(),
            time: entry.time,
            status: entry.status,
            kind: entry.kind,
        }
    }
}

impl From<&LeaderboardEntry> for PublicLeaderboardEntry {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            rank: entry.rank,
            student_name: entry.student_name.clone(),
            class_name: entry.class_name.clone().unwrap_or_default(),
            arrival_time: entry.arrival_time,
        }
    }
}

impl From<&AttendanceStats> for PublicStats {
    fn from(stats: &AttendanceStats) -> Self {
        Self {
            total_students: stats.total_students,
            present: stats.present,
            late: stats.late,
            very_late: stats.very_late,
            absent: stats.absent,
            percentage: stats.percentage,
        }
    }
}

/// Strip a hub event down to what a public screen may see.
pub fn sanitize_event(event: &HubEvent) -> PublicEvent {
    PublicEvent {
        kind: event.kind,
        attendance: event.attendance.as_ref().map(PublicFeedEntry::from),
        stats: event.stats.as_ref().map(PublicStats::from),
        leaderboard: event
            .leaderboard
            .as_ref()
            .map(|entries| entries.iter().map(PublicLeaderboardEntry::from).collect()),
    }
}

/// Assemble a snapshot from dashboard read models.
pub fn build_snapshot(
    school_name: String,
    now: Timestamp,
    local_date: NaiveDate,
    stats: &AttendanceStats,
    feed: &[LiveFeedEntry],
    leaderboard: &[LeaderboardEntry],
) -> PublicSnapshot {
    PublicSnapshot {
        school_name,
        current_time: now,
        date: format_display_date(local_date),
        stats: stats.into(),
        live_feed: feed
            .iter()
            .take(PUBLIC_FEED_SIZE)
            .map(PublicFeedEntry::from)
            .collect(),
        leaderboard: leaderboard.iter().map(PublicLeaderboardEntry::from).collect(),
    }
}

pub fn format_display_date(date: NaiveDate) -> String {
    date.format("%A, %-d %B %Y").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 2, 0, 30, 0).unwrap()
    }

    fn feed_entry(id: i64) -> LiveFeedEntry {
        LiveFeedEntry {
            id,
            student_id: 500 + id,
            student_name: format!("Student {id}"),
            class_id: Some(7),
            class_name: Some("7A".into()),
            time: now(),
            status: AttendanceStatus::Late,
            kind: TapKind::CheckIn,
        }
    }

    #[test]
    fn active_token_without_expiry_is_valid() {
        assert_eq!(check_token(true, None, now()), Ok(()));
    }

    #[test]
    fn inactive_or_expired_tokens_are_refused() {
        assert_eq!(check_token(false, None, now()), Err(TokenRejection::Inactive));
        assert_eq!(check_token(true, Some(now()), now()), Err(TokenRejection::Expired));
        assert_eq!(
            check_token(true, Some(now() + Duration::seconds(1)), now()),
            Ok(())
        );
    }

    #[test]
    fn sanitized_event_carries_no_identifiers() {
        let event = HubEvent::new_attendance(
            42,
            feed_entry(1),
            Some(AttendanceStats::from_counts(10, 5, 1, 0)),
            Some(vec![LeaderboardEntry {
                rank: 1,
                student_id: 99,
                student_name: "Early Bird".into(),
                class_name: None,
                arrival_time: now(),
            }]),
        );
        let json = serde_json::to_string(&sanitize_event(&event)).unwrap();
        for leaked in ["tenant_id", "student_id", "class_id", "\"id\""] {
            assert!(!json.contains(leaked), "{leaked} leaked into {json}");
        }
        assert!(json.contains("Student 1"));
        assert!(json.contains("\"type\":\"new_attendance\""));
    }

    #[test]
    fn snapshot_limits_feed() {
        let feed: Vec<LiveFeedEntry> = (0..25).map(feed_entry).collect();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let snapshot = build_snapshot(
            "SMP 1".into(),
            now(),
            date,
            &AttendanceStats::default(),
            &feed,
            &[],
        );
        assert_eq!(snapshot.live_feed.len(), PUBLIC_FEED_SIZE);
        assert_eq!(snapshot.date, "Monday, 2 March 2026");
        assert_eq!(snapshot.live_feed[0].class_name, "7A");
    }
}
