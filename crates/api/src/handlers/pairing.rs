//! Admin handlers for card pairing sessions.
//!
//! A session lives only in the process's [`PairingTable`]; the card binding
//! itself happens when the device taps (see [`crate::ingest`]).
//!
//! [`PairingTable`]: rollcall_core::pairing::PairingTable

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use rollcall_core::error::CoreError;
use rollcall_core::pairing::{NewPairingSession, PairingError, PairingSession};
use rollcall_core::types::{DbId, Timestamp};
use rollcall_db::models::device::Device;
use rollcall_db::repositories::{DeviceRepo, StudentRepo};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct StartPairing {
    #[validate(range(min = 1))]
    pub device_id: DbId,
    #[validate(range(min = 1))]
    pub student_id: DbId,
}

/// A live session as shown to operators.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub device_id: DbId,
    pub student_id: DbId,
    pub student_name: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub remaining_secs: i64,
}

impl SessionView {
    fn new(session: &PairingSession, now: Timestamp) -> Self {
        Self {
            device_id: session.device_id,
            student_id: session.student_id,
            student_name: session.student_name.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
            remaining_secs: session.remaining_secs(now),
        }
    }
}

/// `{ "active": false }` or `{ "active": true, ...session }`.
#[derive(Debug, Serialize)]
pub struct PairingStatus {
    pub active: bool,
    #[serde(flatten)]
    pub session: Option<SessionView>,
}

#[derive(Debug, Serialize)]
pub struct CancelResult {
    pub device_id: DbId,
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct UnbindResult {
    pub student_id: DbId,
    pub unbound: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The device, if it belongs to `tenant_id`. Other tenants' devices are
/// reported as missing.
async fn tenant_device(state: &AppState, tenant_id: DbId, device_id: DbId) -> AppResult<Device> {
    DeviceRepo::find_by_id(&state.pool, device_id)
        .await?
        .filter(|d| d.tenant_id == tenant_id)
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Device",
            id: device_id,
        }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/pairing
///
/// Open a pairing session: the next card tapped on the device is bound to
/// the student.
pub async fn start_pairing(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<StartPairing>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let device = tenant_device(&state, admin.tenant_id, input.device_id).await?;
    if !device.is_active {
        return Err(AppError::Core(CoreError::Validation(
            "Device is deactivated".into(),
        )));
    }

    let student = StudentRepo::find_by_id(&state.pool, input.student_id)
        .await?
        .filter(|s| s.tenant_id == device.tenant_id && s.is_active)
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Student",
            id: input.student_id,
        }))?;

    if student.has_card() {
        return Err(PairingError::StudentAlreadyPaired {
            student_id: student.id,
        }
        .into());
    }

    let now = Utc::now();
    let session = state.pairing.start(
        NewPairingSession {
            device_id: device.id,
            tenant_id: device.tenant_id,
            student_id: student.id,
            student_name: student.name,
        },
        now,
    )?;

    tracing::info!(
        device_id = device.id,
        student_id = session.student_id,
        user_id = admin.user_id,
        expires_at = %session.expires_at,
        "Pairing session started",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: PairingStatus {
                active: true,
                session: Some(SessionView::new(&session, now)),
            },
        }),
    ))
}

/// GET /api/v1/admin/pairing
pub async fn list_pairing_sessions(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let now = Utc::now();
    let sessions: Vec<SessionView> = state
        .pairing
        .list_active(admin.tenant_id, now)
        .iter()
        .map(|s| SessionView::new(s, now))
        .collect();
    Ok(Json(DataResponse { data: sessions }))
}

/// GET /api/v1/admin/pairing/{device_id}
pub async fn pairing_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(device_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let device = tenant_device(&state, admin.tenant_id, device_id).await?;
    let now = Utc::now();
    let session = state.pairing.active(device.id, now);

    Ok(Json(DataResponse {
        data: PairingStatus {
            active: session.is_some(),
            session: session.as_ref().map(|s| SessionView::new(s, now)),
        },
    }))
}

/// DELETE /api/v1/admin/pairing/{device_id}
///
/// Idempotent: cancelling a device without a session succeeds.
pub async fn cancel_pairing(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(device_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let device = tenant_device(&state, admin.tenant_id, device_id).await?;
    let cancelled = state.pairing.cancel(device.id).is_some();

    if cancelled {
        tracing::info!(device_id, user_id = admin.user_id, "Pairing session cancelled");
    }

    Ok(Json(DataResponse {
        data: CancelResult {
            device_id,
            cancelled,
        },
    }))
}

/// DELETE /api/v1/admin/students/{id}/card
///
/// Clear a student's card so it can be paired again.
pub async fn unbind_card(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(student_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let student = StudentRepo::find_by_id(&state.pool, student_id)
        .await?
        .filter(|s| s.tenant_id == admin.tenant_id)
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Student",
            id: student_id,
        }))?;

    let had_card = student.has_card();
    if had_card {
        let mut conn = state.pool.acquire().await?;
        StudentRepo::clear_card(&mut *conn, student.id).await?;

        tracing::info!(student_id, user_id = admin.user_id, "Student card unbound");
    }

    Ok(Json(DataResponse {
        data: UnbindResult {
            student_id,
            unbound: had_card,
        },
    }))
}
