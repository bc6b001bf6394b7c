//! Admin handlers for device credentials.
//!
//! All endpoints require the admin role and are scoped to the caller's
//! tenant. The cleartext credential appears only in the issue and rotate
//! responses; only its SHA-256 digest is stored.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rollcall_core::credentials::generate_secret;
use rollcall_core::error::CoreError;
use rollcall_core::types::DbId;
use rollcall_db::models::device::{CreateDevice, DeviceCredentialResponse};
use rollcall_db::repositories::DeviceRepo;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/admin/devices
///
/// Register a device and return its credential exactly once.
pub async fn issue_device(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreateDevice>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let code = input.code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("code must not be empty".into()));
    }

    let secret = generate_secret();
    let device = DeviceRepo::create(
        &state.pool,
        admin.tenant_id,
        code,
        input.description.as_deref(),
        &secret.hash,
    )
    .await?;

    tracing::info!(
        device_id = device.id,
        tenant_id = admin.tenant_id,
        user_id = admin.user_id,
        "Device credential issued",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: DeviceCredentialResponse {
                device,
                credential: secret.plaintext,
            },
        }),
    ))
}

/// GET /api/v1/admin/devices
pub async fn list_devices(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let devices = DeviceRepo::list(&state.pool, admin.tenant_id).await?;
    Ok(Json(DataResponse { data: devices }))
}

/// POST /api/v1/admin/devices/{id}/revoke
///
/// Deactivate a device. Its credential stops validating immediately. Any
/// pairing session on the device is dropped.
pub async fn revoke_device(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(device_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let device = DeviceRepo::deactivate(&state.pool, admin.tenant_id, device_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Device",
            id: device_id,
        }))?;

    state.pairing.cancel(device.id);

    tracing::info!(
        device_id,
        user_id = admin.user_id,
        "Device credential revoked",
    );

    Ok(Json(DataResponse { data: device }))
}

/// POST /api/v1/admin/devices/{id}/rotate
///
/// Replace the credential and reactivate the device in one statement. The
/// old credential stops matching as soon as the update commits.
pub async fn rotate_device(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(device_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let secret = generate_secret();
    let device = DeviceRepo::rotate_credential(
        &state.pool,
        admin.tenant_id,
        device_id,
        &secret.hash,
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Device",
        id: device_id,
    }))?;

    tracing::info!(
        device_id,
        user_id = admin.user_id,
        "Device credential rotated",
    );

    Ok(Json(DataResponse {
        data: DeviceCredentialResponse {
            device,
            credential: secret.plaintext,
        },
    }))
}
