//! Repository for the `attendances` table.
//!
//! All writes take a connection so the caller can append the matching outbox
//! row in the same transaction.

use chrono::NaiveDate;
use sqlx::PgConnection;
use rollcall_core::attendance::{AttendanceMethod, AttendanceStatus};
use rollcall_core::types::{DbId, Timestamp};

use crate::models::attendance::{Attendance, ManualAttendance, NewCheckIn};

const COLUMNS: &str = "\
    id, tenant_id, student_id, schedule_id, date, check_in_time, check_out_time, \
    status, method, device_id, created_at, updated_at";

pub struct AttendanceRepo;

impl AttendanceRepo {
    /// The row for a (student, date, schedule) slot, locked for update.
    pub async fn lock_slot(
        conn: &mut PgConnection,
        student_id: DbId,
        date: NaiveDate,
        schedule_id: Option<DbId>,
    ) -> Result<Option<Attendance>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM attendances \
             WHERE student_id = $1 AND date = $2 \
               AND COALESCE(schedule_id, 0) = COALESCE($3::BIGINT, 0) \
             FOR UPDATE"
        );
        sqlx::query_as::<_, Attendance>(&query)
            .bind(student_id)
            .bind(date)
            .bind(schedule_id)
            .fetch_optional(conn)
            .await
    }

    /// The student's most recent checked-in row for `date`, whichever schedule
    /// it belongs to, locked for update.
    pub async fn lock_latest_check_in(
        conn: &mut PgConnection,
        student_id: DbId,
        date: NaiveDate,
    ) -> Result<Option<Attendance>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM attendances \
             WHERE student_id = $1 AND date = $2 AND check_in_time IS NOT NULL \
             ORDER BY check_in_time DESC, id DESC \
             LIMIT 1 \
             FOR UPDATE"
        );
        sqlx::query_as::<_, Attendance>(&query)
            .bind(student_id)
            .bind(date)
            .fetch_optional(conn)
            .await
    }

    /// Insert a device check-in.
    ///
    /// A concurrent insert for the same slot fails on
    /// `uq_attendances_student_date_schedule`.
    pub async fn insert_check_in(
        conn: &mut PgConnection,
        new: &NewCheckIn,
    ) -> Result<Attendance, sqlx::Error> {
        let query = format!(
            "INSERT INTO attendances \
                (tenant_id, student_id, schedule_id, date, check_in_time, status, method, device_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Attendance>(&query)
            .bind(new.tenant_id)
            .bind(new.student_id)
            .bind(new.schedule_id)
            .bind(new.date)
            .bind(new.at)
            .bind(new.status.as_str())
            .bind(AttendanceMethod::Device.as_str())
            .bind(new.device_id)
            .fetch_one(conn)
            .await
    }

    /// Turn a row without a check-in (e.g. a manual "absent") into a device
    /// check-in.
    pub async fn fill_check_in(
        conn: &mut PgConnection,
        id: DbId,
        at: Timestamp,
        status: AttendanceStatus,
        device_id: DbId,
    ) -> Result<Attendance, sqlx::Error> {
        let query = format!(
            "UPDATE attendances SET check_in_time = $2, status = $3, method = $4, \
                 device_id = $5, updated_at = NOW() \
             WHERE id = $1 AND check_in_time IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Attendance>(&query)
            .bind(id)
            .bind(at)
            .bind(status.as_str())
            .bind(AttendanceMethod::Device.as_str())
            .bind(device_id)
            .fetch_one(conn)
            .await
    }

    /// Stamp the check-out time on an open row.
    pub async fn set_check_out(
        conn: &mut PgConnection,
        id: DbId,
        at: Timestamp,
    ) -> Result<Attendance, sqlx::Error> {
        let query = format!(
            "UPDATE attendances SET check_out_time = $2, updated_at = NOW() \
             WHERE id = $1 AND check_out_time IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Attendance>(&query)
            .bind(id)
            .bind(at)
            .fetch_one(conn)
            .await
    }

    /// Insert or overwrite the slot with a staff-entered status.
    ///
    /// Times not supplied keep their recorded values.
    pub async fn upsert_manual(
        conn: &mut PgConnection,
        tenant_id: DbId,
        input: &ManualAttendance,
    ) -> Result<Attendance, sqlx::Error> {
        let query = format!(
            "INSERT INTO attendances \
                (tenant_id, student_id, schedule_id, date, check_in_time, check_out_time, status, method) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (student_id, date, (COALESCE(schedule_id, 0))) DO UPDATE SET \
                 check_in_time = COALESCE(EXCLUDED.check_in_time, attendances.check_in_time), \
                 check_out_time = COALESCE(EXCLUDED.check_out_time, attendances.check_out_time), \
                 status = EXCLUDED.status, \
                 method = EXCLUDED.method, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Attendance>(&query)
            .bind(tenant_id)
            .bind(input.student_id)
            .bind(input.schedule_id)
            .bind(input.date)
            .bind(input.check_in_time)
            .bind(input.check_out_time)
            .bind(input.status.as_str())
            .bind(AttendanceMethod::Manual.as_str())
            .fetch_one(conn)
            .await
    }
}
