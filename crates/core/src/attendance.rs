//! Attendance status/method vocabulary and the tap-to-record transition.
//!
//! A student has at most one attendance row per (date, schedule). The first
//! tap creates it as a check-in, the second stamps the check-out, and any
//! further tap is a no-op. [`next_tap_action`] is the single place that
//! decides which of those applies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Classified attendance status stored on every attendance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    OnTime,
    Late,
    VeryLate,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnTime => "on_time",
            Self::Late => "late",
            Self::VeryLate => "very_late",
            Self::Absent => "absent",
        }
    }

    /// Whether the student was physically present.
    pub fn is_present(self) -> bool {
        !matches!(self, Self::Absent)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = AttendanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_time" => Ok(Self::OnTime),
            "late" => Ok(Self::Late),
            "very_late" => Ok(Self::VeryLate),
            "absent" => Ok(Self::Absent),
            other => Err(AttendanceError::UnknownStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// How an attendance row was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceMethod {
    /// A tap on a physical terminal.
    Device,
    /// Entered by staff.
    Manual,
}

impl AttendanceMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for AttendanceMethod {
    type Err = AttendanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "device" => Ok(Self::Device),
            "manual" => Ok(Self::Manual),
            other => Err(AttendanceError::UnknownMethod(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tap transition
// ---------------------------------------------------------------------------

/// What kind of entry a tap produced, as surfaced in feeds and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TapKind {
    CheckIn,
    CheckOut,
    AlreadyCheckedOut,
}

impl TapKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckIn => "check_in",
            Self::CheckOut => "check_out",
            Self::AlreadyCheckedOut => "already_checked_out",
        }
    }
}

/// The check-in/check-out pair of an existing attendance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistingRecord {
    pub check_in: Option<Timestamp>,
    pub check_out: Option<Timestamp>,
}

/// The write a tap should perform against the (student, date, schedule) row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapAction {
    /// No row yet: insert one with this check-in time.
    CheckIn { at: Timestamp },
    /// Row without a check-out: stamp it.
    CheckOut { at: Timestamp },
    /// Row already closed: write nothing.
    AlreadyCheckedOut,
}

impl TapAction {
    pub fn kind(&self) -> TapKind {
        match self {
            Self::CheckIn { .. } => TapKind::CheckIn,
            Self::CheckOut { .. } => TapKind::CheckOut,
            Self::AlreadyCheckedOut => TapKind::AlreadyCheckedOut,
        }
    }
}

/// Decide what a tap at `at` does to the existing row, if any.
///
/// A check-out earlier than the recorded check-in is rejected rather than
/// stored.
pub fn next_tap_action(
    existing: Option<&ExistingRecord>,
    at: Timestamp,
) -> Result<TapAction, AttendanceError> {
    match existing {
        None => Ok(TapAction::CheckIn { at }),
        Some(ExistingRecord {
            check_out: Some(_), ..
        }) => Ok(TapAction::AlreadyCheckedOut),
        Some(ExistingRecord {
            check_in: Some(check_in),
            check_out: None,
        }) if at < *check_in => Err(AttendanceError::CheckOutBeforeCheckIn),
        Some(_) => Ok(TapAction::CheckOut { at }),
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttendanceError {
    #[error("check-out time cannot be before check-in time")]
    CheckOutBeforeCheckIn,

    #[error("unknown attendance status '{0}'")]
    UnknownStatus(String),

    #[error("unknown attendance method '{0}'")]
    UnknownMethod(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32, m: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn first_tap_checks_in() {
        let action = next_tap_action(None, at(7, 5)).unwrap();
        assert_eq!(action, TapAction::CheckIn { at: at(7, 5) });
        assert_eq!(action.kind(), TapKind::CheckIn);
    }

    #[test]
    fn second_tap_checks_out_same_row() {
        let row = ExistingRecord {
            check_in: Some(at(7, 5)),
            check_out: None,
        };
        let action = next_tap_action(Some(&row), at(15, 0)).unwrap();
        assert_eq!(action, TapAction::CheckOut { at: at(15, 0) });
    }

    #[test]
    fn third_tap_is_a_no_op() {
        let row = ExistingRecord {
            check_in: Some(at(7, 5)),
            check_out: Some(at(15, 0)),
        };
        let action = next_tap_action(Some(&row), at(15, 30)).unwrap();
        assert_eq!(action, TapAction::AlreadyCheckedOut);
    }

    #[test]
    fn sequence_of_taps_never_opens_a_second_row() {
        let mut row: Option<ExistingRecord> = None;
        let mut inserts = 0;
        for (i, minute) in [5u32, 10, 20, 30, 40].into_iter().enumerate() {
            let tap = at(7 + i as u32, minute);
            match next_tap_action(row.as_ref(), tap).unwrap() {
                TapAction::CheckIn { at } => {
                    inserts += 1;
                    row = Some(ExistingRecord {
                        check_in: Some(at),
                        check_out: None,
                    });
                }
                TapAction::CheckOut { at } => {
                    row.as_mut().unwrap().check_out = Some(at);
                }
                TapAction::AlreadyCheckedOut => {}
            }
        }
        assert_eq!(inserts, 1);
        assert_eq!(row.unwrap().check_out, Some(at(8, 10)));
    }

    #[test]
    fn check_out_before_check_in_is_rejected() {
        let row = ExistingRecord {
            check_in: Some(at(9, 0)),
            check_out: None,
        };
        assert_matches!(
            next_tap_action(Some(&row), at(8, 59)),
            Err(AttendanceError::CheckOutBeforeCheckIn)
        );
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            AttendanceStatus::OnTime,
            AttendanceStatus::Late,
            AttendanceStatus::VeryLate,
            AttendanceStatus::Absent,
        ] {
            assert_eq!(status.as_str().parse::<AttendanceStatus>().unwrap(), status);
        }
        assert_matches!(
            "tardy".parse::<AttendanceStatus>(),
            Err(AttendanceError::UnknownStatus(_))
        );
    }

    #[test]
    fn absent_is_not_present() {
        assert!(AttendanceStatus::VeryLate.is_present());
        assert!(!AttendanceStatus::Absent.is_present());
    }
}
