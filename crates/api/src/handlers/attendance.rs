//! Attendance endpoints: the device tap and staff-entered attendance.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rollcall_db::models::attendance::ManualAttendance;

use crate::error::AppResult;
use crate::ingest::{self, TapRequest};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/device/taps
///
/// Authenticated by the device credential in the body, not by a JWT. The
/// same shape serves attendance and pairing taps.
pub async fn submit_tap(
    State(state): State<AppState>,
    Json(input): Json<TapRequest>,
) -> AppResult<impl IntoResponse> {
    let response = ingest::process_tap(&state, input).await?;
    Ok(Json(DataResponse { data: response }))
}

/// POST /api/v1/admin/attendance/manual
pub async fn record_manual_attendance(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<ManualAttendance>,
) -> AppResult<impl IntoResponse> {
    let record = ingest::attendance::record_manual(&state, admin.tenant_id, &input).await?;

    tracing::info!(
        attendance_id = record.id,
        student_id = record.student_id,
        status = %input.status,
        user_id = admin.user_id,
        "Manual attendance recorded",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}
