//! Intermediate rows for the live dashboard queries.
//!
//! These map onto the read models in `rollcall_core::realtime`; status and
//! kind arrive as text and are parsed during conversion.

use sqlx::FromRow;
use rollcall_core::attendance::{AttendanceStatus, TapKind};
use rollcall_core::realtime::{LeaderboardEntry, LiveFeedEntry};
use rollcall_core::types::{DbId, Timestamp};

#[derive(Debug, Clone, FromRow)]
pub struct LiveFeedRow {
    pub id: DbId,
    pub student_id: DbId,
    pub student_name: String,
    pub class_id: Option<DbId>,
    pub class_name: Option<String>,
    pub event_time: Timestamp,
    pub status: String,
    pub checked_out: bool,
}

impl LiveFeedRow {
    /// `None` for rows whose status text is not a known status.
    pub fn into_entry(self) -> Option<LiveFeedEntry> {
        let status: AttendanceStatus = self.status.parse().ok()?;
        Some(LiveFeedEntry {
            id: self.id,
            student_id: self.student_id,
            student_name: self.student_name,
            class_id: self.class_id,
            class_name: self.class_name,
            time: self.event_time,
            status,
            kind: if self.checked_out {
                TapKind::CheckOut
            } else {
                TapKind::CheckIn
            },
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LeaderboardRow {
    pub rank: i64,
    pub student_id: DbId,
    pub student_name: String,
    pub class_name: Option<String>,
    pub arrival_time: Timestamp,
}

impl From<LeaderboardRow> for LeaderboardEntry {
    fn from(row: LeaderboardRow) -> Self {
        Self {
            rank: i32::try_from(row.rank).unwrap_or(i32::MAX),
            student_id: row.student_id,
            student_name: row.student_name,
            class_name: row.class_name,
            arrival_time: row.arrival_time,
        }
    }
}

/// Per-status counts for one day.
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct StatusCounts {
    pub on_time: i64,
    pub late: i64,
    pub very_late: i64,
}
