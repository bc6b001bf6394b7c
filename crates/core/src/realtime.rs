//! Live dashboard read models and the events the broadcast hub carries.

use serde::{Deserialize, Serialize};

use crate::attendance::{AttendanceStatus, TapKind};
use crate::types::{DbId, Timestamp};

/// Number of entries in the earliest-arrival leaderboard.
pub const LEADERBOARD_SIZE: usize = 10;

/// Default number of entries returned by the dashboard live feed.
pub const DASHBOARD_FEED_SIZE: usize = 20;

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// One row of the live attendance feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveFeedEntry {
    /// Attendance row id.
    pub id: DbId,
    pub student_id: DbId,
    pub student_name: String,
    pub class_id: Option<DbId>,
    pub class_name: Option<String>,
    pub time: Timestamp,
    pub status: AttendanceStatus,
    #[serde(rename = "type")]
    pub kind: TapKind,
}

/// One earliest-arrival entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: i32,
    pub student_id: DbId,
    pub student_name: String,
    pub class_name: Option<String>,
    pub arrival_time: Timestamp,
}

/// Today's aggregate counts for a tenant (optionally one class).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub total_students: i64,
    /// Students who arrived on time.
    pub present: i64,
    pub late: i64,
    pub very_late: i64,
    /// Students without an arrival today.
    pub absent: i64,
    /// Arrived students as a percentage of all active students.
    pub percentage: f64,
}

impl AttendanceStats {
    /// Derive the aggregate from per-status counts of today's rows.
    ///
    /// Rows recorded as absent do not count as arrivals; students without
    /// any row are absent as well.
    pub fn from_counts(total_students: i64, on_time: i64, late: i64, very_late: i64) -> Self {
        let arrived = on_time + late + very_late;
        let percentage = if total_students > 0 {
            arrived as f64 / total_students as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_students,
            present: on_time,
            late,
            very_late,
            absent: (total_students - arrived).max(0),
            percentage,
        }
    }
}

// ---------------------------------------------------------------------------
// Hub events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubEventKind {
    NewAttendance,
    StatsUpdate,
    LeaderboardUpdate,
}

/// A tenant-scoped event published to the broadcast hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    #[serde(rename = "type")]
    pub kind: HubEventKind,
    pub tenant_id: DbId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance: Option<LiveFeedEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<AttendanceStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
}

impl HubEvent {
    pub fn new_attendance(
        tenant_id: DbId,
        entry: LiveFeedEntry,
        stats: Option<AttendanceStats>,
        leaderboard: Option<Vec<LeaderboardEntry>>,
    ) -> Self {
        Self {
            kind: HubEventKind::NewAttendance,
            tenant_id,
            attendance: Some(entry),
            stats,
            leaderboard,
        }
    }

    pub fn stats_update(tenant_id: DbId, stats: AttendanceStats) -> Self {
        Self {
            kind: HubEventKind::StatsUpdate,
            tenant_id,
            attendance: None,
            stats: Some(stats),
            leaderboard: None,
        }
    }

    pub fn leaderboard_update(tenant_id: DbId, leaderboard: Vec<LeaderboardEntry>) -> Self {
        Self {
            kind: HubEventKind::LeaderboardUpdate,
            tenant_id,
            attendance: None,
            stats: None,
            leaderboard: Some(leaderboard),
        }
    }

    /// Class of the attendance entry, if the event carries one.
    pub fn class_id(&self) -> Option<DbId> {
        self.attendance.as_ref().and_then(|a| a.class_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn stats_from_counts() {
        let stats = AttendanceStats::from_counts(40, 20, 8, 2);
        assert_eq!(stats.present, 20);
        assert_eq!(stats.absent, 10);
        assert!((stats.percentage - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stats_with_no_students_is_zero_percent() {
        let stats = AttendanceStats::from_counts(0, 0, 0, 0);
        assert_eq!(stats.percentage, 0.0);
        assert_eq!(stats.absent, 0);
    }

    #[test]
    fn absent_never_negative() {
        // Students deactivated after tapping in can push arrivals past total.
        let stats = AttendanceStats::from_counts(3, 4, 0, 0);
        assert_eq!(stats.absent, 0);
    }

    #[test]
    fn event_serializes_with_type_tag_and_omits_empty_parts() {
        let event = HubEvent::stats_update(3, AttendanceStats::from_counts(1, 1, 0, 0));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stats_update");
        assert_eq!(json["tenant_id"], 3);
        assert!(json.get("attendance").is_none());
        assert!(json.get("leaderboard").is_none());
    }

    #[test]
    fn new_attendance_exposes_class() {
        let entry = LiveFeedEntry {
            id: 1,
            student_id: 2,
            student_name: "Sari".into(),
            class_id: Some(9),
            class_name: Some("8B".into()),
            time: Utc.with_ymd_and_hms(2026, 3, 2, 0, 5, 0).unwrap(),
            status: AttendanceStatus::OnTime,
            kind: TapKind::CheckIn,
        };
        let event = HubEvent::new_attendance(1, entry, None, None);
        assert_eq!(event.class_id(), Some(9));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["attendance"]["type"], "check_in");
    }
}
