//! Outbox vocabulary and the delivery retry policy.
//!
//! Every guardian-facing domain action writes one `outbox_events` row in the
//! same transaction as its business write. The delivery worker later claims
//! those rows and pushes them out; this module decides what the payload looks
//! like and how long to wait after each failed attempt.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::attendance::{AttendanceStatus, TapKind};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

pub const EVENT_ATTENDANCE_CHECK_IN: &str = "attendance.check_in";
pub const EVENT_ATTENDANCE_CHECK_OUT: &str = "attendance.check_out";
pub const EVENT_ATTENDANCE_MANUAL: &str = "attendance.manual";
pub const EVENT_PAIRING_COMPLETED: &str = "pairing.completed";

/// Outbox event type for a device tap, if the tap wrote anything.
pub fn event_type_for_tap(kind: TapKind) -> Option<&'static str> {
    match kind {
        TapKind::CheckIn => Some(EVENT_ATTENDANCE_CHECK_IN),
        TapKind::CheckOut => Some(EVENT_ATTENDANCE_CHECK_OUT),
        TapKind::AlreadyCheckedOut => None,
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Published,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown outbox status '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Serialized into `outbox_events.payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianNotice {
    pub tenant_id: DbId,
    pub student_id: DbId,
    pub student_name: String,
    pub class_name: Option<String>,
    /// Local wall-clock time of the action.
    pub occurred_at: NaiveDateTime,
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
}

/// Title and body of a push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushText {
    pub title: String,
    pub body: String,
}

impl GuardianNotice {
    pub fn render(&self, event_type: &str) -> PushText {
        let time = self.occurred_at.format("%H:%M");
        let status = self.status.map(status_label).unwrap_or("recorded");
        match event_type {
            EVENT_ATTENDANCE_CHECK_IN => PushText {
                title: "Arrived at school".into(),
                body: format!("{} checked in at {time} ({status}).", self.student_name),
            },
            EVENT_ATTENDANCE_CHECK_OUT => PushText {
                title: "Left school".into(),
                body: format!("{} checked out at {time}.", self.student_name),
            },
            EVENT_ATTENDANCE_MANUAL => PushText {
                title: "Attendance updated".into(),
                body: format!("{}'s attendance was marked {status}.", self.student_name),
            },
            EVENT_PAIRING_COMPLETED => PushText {
                title: "Card registered".into(),
                body: format!("A new attendance card was registered for {}.", self.student_name),
            },
            _ => PushText {
                title: "Attendance".into(),
                body: format!("Update for {}.", self.student_name),
            },
        }
    }
}

fn status_label(status: AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::OnTime => "on time",
        AttendanceStatus::Late => "late",
        AttendanceStatus::VeryLate => "very late",
        AttendanceStatus::Absent => "absent",
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Exponential backoff with a retry budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Failed attempts allowed before the event is marked failed.
    pub max_retries: i32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

/// What to do with an event after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep pending; try again after `delay`. `retry_count` is the new count.
    Retry { retry_count: i32, delay: Duration },
    /// Budget exhausted; mark failed.
    GiveUp { retry_count: i32 },
}

impl RetryPolicy {
    /// Delay before attempt number `retry_count + 1`.
    ///
    /// `initial * multiplier^(retry_count - 1)`, clamped to `max_delay`.
    pub fn backoff_delay(&self, retry_count: i32) -> Duration {
        let exponent = (retry_count.max(1) - 1) as f64;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powf(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Decide the next step for an event that has failed `previous_retries`
    /// times before this failure.
    pub fn after_failure(&self, previous_retries: i32) -> RetryDecision {
        let retry_count = previous_retries.saturating_add(1);
        if retry_count >= self.max_retries {
            RetryDecision::GiveUp { retry_count }
        } else {
            RetryDecision::Retry {
                retry_count,
                delay: self.backoff_delay(retry_count),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
