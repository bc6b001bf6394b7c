//! Attendance rows and the manual-entry DTO.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use rollcall_core::attendance::{AttendanceStatus, ExistingRecord};
use rollcall_core::types::{DbId, Timestamp};

/// A row from the `attendances` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attendance {
    pub id: DbId,
    pub tenant_id: DbId,
    pub student_id: DbId,
    pub schedule_id: Option<DbId>,
    pub date: NaiveDate,
    pub check_in_time: Option<Timestamp>,
    pub check_out_time: Option<Timestamp>,
    pub status: String,
    pub method: String,
    pub device_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Attendance {
    pub fn as_existing(&self) -> ExistingRecord {
        ExistingRecord {
            check_in: self.check_in_time,
            check_out: self.check_out_time,
        }
    }
}

/// Fields for a new device check-in row.
#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub tenant_id: DbId,
    pub student_id: DbId,
    pub schedule_id: Option<DbId>,
    pub date: NaiveDate,
    pub at: Timestamp,
    pub status: AttendanceStatus,
    pub device_id: DbId,
}

/// Admin request body for manual attendance.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualAttendance {
    pub student_id: DbId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub schedule_id: Option<DbId>,
    pub check_in_time: Option<Timestamp>,
    pub check_out_time: Option<Timestamp>,
}
