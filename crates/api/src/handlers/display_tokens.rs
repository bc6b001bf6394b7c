//! Admin handlers for public display tokens.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use rollcall_core::credentials::generate_secret;
use rollcall_core::error::CoreError;
use rollcall_core::types::DbId;
use rollcall_db::models::display_token::{CreateDisplayToken, DisplayTokenCreatedResponse};
use rollcall_db::repositories::DisplayTokenRepo;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/admin/display-tokens
///
/// The token is in the response exactly once.
pub async fn issue_display_token(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreateDisplayToken>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    if input.expires_at.is_some_and(|at| at <= Utc::now()) {
        return Err(AppError::BadRequest("expires_at must be in the future".into()));
    }

    let secret = generate_secret();
    let display_token = DisplayTokenRepo::create(
        &state.pool,
        admin.tenant_id,
        input.name.trim(),
        &secret.hash,
        input.expires_at,
    )
    .await?;

    tracing::info!(
        display_token_id = display_token.id,
        tenant_id = admin.tenant_id,
        user_id = admin.user_id,
        "Display token issued",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: DisplayTokenCreatedResponse {
                display_token,
                token: secret.plaintext,
            },
        }),
    ))
}

/// GET /api/v1/admin/display-tokens
pub async fn list_display_tokens(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let tokens = DisplayTokenRepo::list(&state.pool, admin.tenant_id).await?;
    Ok(Json(DataResponse { data: tokens }))
}

/// POST /api/v1/admin/display-tokens/{id}/revoke
///
/// Takes effect on the next validation. Screens already connected are not
/// disconnected until they reconnect.
pub async fn revoke_display_token(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(token_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let token = DisplayTokenRepo::revoke(&state.pool, admin.tenant_id, token_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "DisplayToken",
            id: token_id,
        }))?;

    tracing::info!(
        display_token_id = token_id,
        user_id = admin.user_id,
        "Display token revoked",
    );

    Ok(Json(DataResponse { data: token }))
}
