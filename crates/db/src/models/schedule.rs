//! Attendance schedule rows.

use chrono::NaiveTime;
use serde::Serialize;
use sqlx::FromRow;
use rollcall_core::error::CoreError;
use rollcall_core::schedule::{ScheduleWindow, WeekdaySet};
use rollcall_core::types::DbId;

/// A row from the `attendance_schedules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttendanceSchedule {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub late_threshold: i32,
    pub very_late_threshold: Option<i32>,
    pub days_of_week: String,
    pub is_active: bool,
    pub is_default: bool,
}

impl AttendanceSchedule {
    /// Convert to the policy engine's window, validating thresholds and the
    /// weekday list.
    pub fn to_window(&self) -> Result<ScheduleWindow, CoreError> {
        let window = ScheduleWindow {
            id: self.id,
            name: self.name.clone(),
            start: self.start_time,
            end: self.end_time,
            late_threshold: self.late_threshold,
            very_late_threshold: self.very_late_threshold,
            weekdays: WeekdaySet::parse(&self.days_of_week)?,
            is_active: self.is_active,
            is_default: self.is_default,
        };
        window.validate_thresholds()?;
        Ok(window)
    }
}

/// Convert every row, skipping (and logging) rows that fail validation so a
/// single bad schedule cannot block classification.
pub fn usable_windows(rows: &[AttendanceSchedule]) -> Vec<ScheduleWindow> {
    rows.iter()
        .filter_map(|row| match row.to_window() {
            Ok(window) => Some(window),
            Err(e) => {
                tracing::warn!(schedule_id = row.id, error = %e, "Skipping invalid schedule");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: DbId, days: &str, late: i32, very_late: Option<i32>) -> AttendanceSchedule {
        AttendanceSchedule {
            id,
            tenant_id: 1,
            name: "Morning".into(),
            start_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            late_threshold: late,
            very_late_threshold: very_late,
            days_of_week: days.into(),
            is_active: true,
            is_default: false,
        }
    }

    #[test]
    fn converts_valid_row() {
        let window = row(1, "1,2,3", 10, Some(30)).to_window().unwrap();
        assert_eq!(window.late_threshold, 10);
        assert!(window.weekdays.contains(chrono::Weekday::Wed));
    }

    #[test]
    fn usable_windows_skips_invalid_rows() {
        let rows = vec![row(1, "1", 10, None), row(2, "9", 10, None), row(3, "1", 20, Some(5))];
        let windows = usable_windows(&rows);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].id, 1);
    }
}
