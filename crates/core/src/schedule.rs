//! Attendance schedule windows.
//!
//! A tenant configures named windows ("morning entry", "afternoon prayer")
//! with a start/end time of day, lateness thresholds in minutes, and the
//! weekdays the window applies to. The policy engine in [`crate::policy`]
//! picks one window per tap; this module only models and validates them.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Maximum length of a schedule name.
pub const MAX_NAME_LENGTH: usize = 100;

// ---------------------------------------------------------------------------
// WeekdaySet
// ---------------------------------------------------------------------------

/// A set of weekdays stored as a bitmask (bit 0 = Monday ... bit 6 = Sunday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(0b111_1111);

    /// Parse the stored comma-separated form.
    ///
    /// Values `1..=6` are Monday..Saturday; both `0` and `7` are Sunday, so
    /// lists written Sunday-first (`0..=6`) and Monday-first (`1..=7`) read
    /// the same way. An empty string means every day.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::ALL);
        }

        let mut set = Self::EMPTY;
        for part in raw.split(',') {
            let n: u8 = part.trim().parse().map_err(|_| {
                CoreError::Validation("days_of_week must contain comma-separated numbers".into())
            })?;
            let day = match n {
                0 | 7 => Weekday::Sun,
                1 => Weekday::Mon,
                2 => Weekday::Tue,
                3 => Weekday::Wed,
                4 => Weekday::Thu,
                5 => Weekday::Fri,
                6 => Weekday::Sat,
                _ => {
                    return Err(CoreError::Validation(
                        "days_of_week values must be between 0 and 7".into(),
                    ))
                }
            };
            set = set.with(day);
        }
        Ok(set)
    }

    pub fn with(self, day: Weekday) -> Self {
        Self(self.0 | (1 << day.num_days_from_monday()))
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }
}

impl Default for WeekdaySet {
    fn default() -> Self {
        Self::ALL
    }
}

// ---------------------------------------------------------------------------
// ScheduleWindow
// ---------------------------------------------------------------------------

/// A validated attendance schedule, detached from its database row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleWindow {
    pub id: DbId,
    pub name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Minutes after `start` from which a tap counts as late.
    pub late_threshold: i32,
    /// Minutes after `start` from which a tap counts as very late.
    pub very_late_threshold: Option<i32>,
    pub weekdays: WeekdaySet,
    pub is_active: bool,
    pub is_default: bool,
}

impl ScheduleWindow {
    /// Build a window from its stored representation, validating every field.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: DbId,
        name: &str,
        start: &str,
        end: &str,
        late_threshold: i32,
        very_late_threshold: Option<i32>,
        days_of_week: &str,
        is_active: bool,
        is_default: bool,
    ) -> Result<Self, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("name is required".into()));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(CoreError::Validation(format!(
                "name must be at most {MAX_NAME_LENGTH} characters"
            )));
        }

        let window = Self {
            id,
            name: name.to_string(),
            start: parse_time_of_day(start, "start_time")?,
            end: parse_time_of_day(end, "end_time")?,
            late_threshold,
            very_late_threshold,
            weekdays: WeekdaySet::parse(days_of_week)?,
            is_active,
            is_default,
        };
        window.validate_thresholds()?;
        Ok(window)
    }

    /// Thresholds must be non-negative and very-late must not precede late.
    pub fn validate_thresholds(&self) -> Result<(), CoreError> {
        if self.late_threshold < 0 {
            return Err(CoreError::Validation(
                "late_threshold must be non-negative".into(),
            ));
        }
        if let Some(very_late) = self.very_late_threshold {
            if very_late < self.late_threshold {
                return Err(CoreError::Validation(
                    "very_late_threshold must be greater than or equal to late_threshold".into(),
                ));
            }
        }
        Ok(())
    }

    /// Active flag set and the date's weekday is in the weekday set.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.is_active && self.weekdays.contains(date.weekday())
    }

    /// Whether `time` falls inside `[start, end]`.
    ///
    /// A window whose end precedes its start spans midnight.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }

    pub fn spans_midnight(&self) -> bool {
        self.end < self.start
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(raw: &str, field: &str) -> Result<NaiveTime, CoreError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| CoreError::Validation(format!("{field} must be in HH:MM or HH:MM:SS format")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
