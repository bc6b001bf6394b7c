//! Attendance taps and staff-entered attendance.

use chrono::Utc;
use rollcall_core::attendance::{
    next_tap_action, AttendanceError, AttendanceStatus, TapAction, TapKind,
};
use rollcall_core::error::CoreError;
use rollcall_core::outbox::{event_type_for_tap, GuardianNotice, EVENT_ATTENDANCE_MANUAL};
use rollcall_core::policy::classify_tap;
use rollcall_core::realtime::LiveFeedEntry;
use rollcall_core::types::{DbId, Timestamp};
use rollcall_db::models::attendance::{Attendance, ManualAttendance, NewCheckIn};
use rollcall_db::models::device::Device;
use rollcall_db::models::schedule::usable_windows;
use rollcall_db::models::student::Student;
use rollcall_db::repositories::{AttendanceRepo, ScheduleRepo, StudentRepo};

use super::broadcast::publish_attendance;
use super::{record_notice, TapResponse};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Record an ordinary tap at `at`.
///
/// The slot row is locked for the whole transition, so the outbox row and
/// the attendance write commit or roll back together. The hub is told only
/// after commit.
pub async fn record_tap(
    state: &AppState,
    device: &Device,
    card_id: &str,
    at: Timestamp,
) -> AppResult<TapResponse> {
    let Some(student) =
        StudentRepo::find_active_by_card(&state.pool, device.tenant_id, card_id).await?
    else {
        tracing::info!(device_id = device.id, "Tap with an unregistered card");
        return Err(AppError::UnknownCard);
    };

    let local = state.clock.local(at);
    let mut tx = state.pool.begin().await?;

    // Once the student has arrived today, every later tap acts on that row
    // no matter which window the tap time falls in. Only a first arrival is
    // classified.
    let (existing, arrival) =
        match AttendanceRepo::lock_latest_check_in(&mut *tx, student.id, local.date()).await? {
            Some(row) => (Some(row), None),
            None => {
                let schedules = ScheduleRepo::list_active(&state.pool, device.tenant_id).await?;
                let classification = classify_tap(&usable_windows(&schedules), local);
                let slot = AttendanceRepo::lock_slot(
                    &mut *tx,
                    student.id,
                    local.date(),
                    classification.schedule_id,
                )
                .await?;
                (slot, Some(classification))
            }
        };

    // Rows without a check-in (staff marked the student absent) take the
    // tap as the arrival.
    let action = match &existing {
        Some(row) if row.check_in_time.is_none() => TapAction::CheckIn { at },
        other => next_tap_action(other.as_ref().map(Attendance::as_existing).as_ref(), at)?,
    };

    let record = match (action, existing, arrival) {
        (TapAction::CheckIn { at }, Some(row), Some(arrival)) => {
            AttendanceRepo::fill_check_in(&mut *tx, row.id, at, arrival.status, device.id).await?
        }
        (TapAction::CheckIn { at }, None, Some(arrival)) => {
            AttendanceRepo::insert_check_in(
                &mut *tx,
                &NewCheckIn {
                    tenant_id: device.tenant_id,
                    student_id: student.id,
                    schedule_id: arrival.schedule_id,
                    date: local.date(),
                    at,
                    status: arrival.status,
                    device_id: device.id,
                },
            )
            .await?
        }
        (TapAction::CheckOut { at }, Some(row), _) => {
            AttendanceRepo::set_check_out(&mut *tx, row.id, at).await?
        }
        (TapAction::AlreadyCheckedOut, Some(row), _) => row,
        _ => {
            return Err(AppError::InternalError(
                "Tap transition without a matching row".into(),
            ))
        }
    };

    let kind = action.kind();
    let status: AttendanceStatus = record.status.parse()?;

    if let Some(event_type) = event_type_for_tap(kind) {
        let notice = GuardianNotice {
            tenant_id: device.tenant_id,
            student_id: student.id,
            student_name: student.name.clone(),
            class_name: student.class_name.clone(),
            occurred_at: local,
            status: Some(status),
        };
        record_notice(&mut *tx, event_type, &notice).await?;
    }

    tx.commit().await?;

    tracing::info!(
        device_id = device.id,
        student_id = student.id,
        attendance_id = record.id,
        kind = kind.as_str(),
        status = status.as_str(),
        "Tap recorded",
    );

    if kind != TapKind::AlreadyCheckedOut {
        publish_attendance(
            state,
            device.tenant_id,
            feed_entry(&student, record.id, at, status, kind),
        );
    }

    let message = match kind {
        TapKind::CheckIn => format!("Welcome, {}", student.name),
        TapKind::CheckOut => format!("Goodbye, {}", student.name),
        TapKind::AlreadyCheckedOut => format!("{} has already checked out", student.name),
    };

    Ok(TapResponse {
        outcome: kind.into(),
        status: Some(status),
        checked_out: record.check_out_time.is_some(),
        student_id: student.id,
        student_name: student.name,
        time: at,
        message,
    })
}

/// Staff-entered attendance for one student and date.
///
/// Shares the slot row with device taps and writes the same outbox and hub
/// events.
pub async fn record_manual(
    state: &AppState,
    tenant_id: DbId,
    input: &ManualAttendance,
) -> AppResult<Attendance> {
    if let (Some(check_in), Some(check_out)) = (input.check_in_time, input.check_out_time) {
        if check_out < check_in {
            return Err(AttendanceError::CheckOutBeforeCheckIn.into());
        }
    }

    let student = match StudentRepo::find_by_id(&state.pool, input.student_id).await? {
        Some(s) if s.tenant_id == tenant_id => s,
        _ => {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "Student",
                id: input.student_id,
            }))
        }
    };

    let mut tx = state.pool.begin().await?;
    let record = AttendanceRepo::upsert_manual(&mut *tx, tenant_id, input).await?;

    let occurred_at = state.clock.local(input.check_in_time.unwrap_or_else(Utc::now));
    let notice = GuardianNotice {
        tenant_id,
        student_id: student.id,
        student_name: student.name.clone(),
        class_name: student.class_name.clone(),
        occurred_at,
        status: Some(input.status),
    };
    record_notice(&mut *tx, EVENT_ATTENDANCE_MANUAL, &notice).await?;
    tx.commit().await?;

    if input.status.is_present() {
        let (time, kind) = match (record.check_out_time, record.check_in_time) {
            (Some(out), _) => (out, TapKind::CheckOut),
            (None, Some(check_in)) => (check_in, TapKind::CheckIn),
            (None, None) => (Utc::now(), TapKind::CheckIn),
        };
        publish_attendance(
            state,
            tenant_id,
            feed_entry(&student, record.id, time, input.status, kind),
        );
    }

    Ok(record)
}

fn feed_entry(
    student: &Student,
    attendance_id: DbId,
    time: Timestamp,
    status: AttendanceStatus,
    kind: TapKind,
) -> LiveFeedEntry {
    LiveFeedEntry {
        id: attendance_id,
        student_id: student.id,
        student_name: student.name.clone(),
        class_id: student.class_id,
        class_name: student.class_name.clone(),
        time,
        status,
        kind,
    }
}
