//! Token-gated public display.
//!
//! No JWT here: the display token in the path is the capability. Every
//! refusal looks the same to the caller; the reason is only logged.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use rollcall_core::credentials::{fingerprint, hash_secret, is_well_formed};
use rollcall_core::display::{
    build_snapshot, check_token, PublicSnapshot, TokenRejection, PUBLIC_FEED_SIZE,
};
use rollcall_core::realtime::LEADERBOARD_SIZE;
use rollcall_db::models::display_token::ResolvedDisplayToken;
use rollcall_db::repositories::{DisplayTokenRepo, RealtimeRepo};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Validate a display token and stamp its last access.
///
/// Checked against the database on every call, so a revocation applies to
/// the very next request.
pub async fn resolve_display_token(
    state: &AppState,
    token: &str,
) -> AppResult<ResolvedDisplayToken> {
    let reject = |reason: TokenRejection| {
        tracing::warn!(
            fingerprint = %fingerprint(token),
            reason = reason.as_str(),
            "Rejected display token",
        );
        AppError::InvalidDisplayToken
    };

    if !is_well_formed(token) {
        return Err(reject(TokenRejection::Malformed));
    }

    let resolved = DisplayTokenRepo::find_by_hash(&state.pool, &hash_secret(token))
        .await?
        .ok_or_else(|| reject(TokenRejection::Unknown))?;

    check_token(resolved.is_active, resolved.expires_at, Utc::now()).map_err(reject)?;

    DisplayTokenRepo::touch_last_accessed(&state.pool, resolved.id).await?;
    Ok(resolved)
}

/// Validate `token` and build the tenant's current snapshot.
pub async fn load_snapshot(state: &AppState, token: &str) -> AppResult<PublicSnapshot> {
    let resolved = resolve_display_token(state, token).await?;

    let now = Utc::now();
    let today = state.clock.local_date(now);
    let stats = RealtimeRepo::stats(&state.pool, resolved.tenant_id, None, today).await?;
    let feed = RealtimeRepo::live_feed(
        &state.pool,
        resolved.tenant_id,
        None,
        today,
        PUBLIC_FEED_SIZE as i64,
    )
    .await?;
    let leaderboard =
        RealtimeRepo::leaderboard(&state.pool, resolved.tenant_id, today, LEADERBOARD_SIZE as i64)
            .await?;

    Ok(build_snapshot(resolved.tenant_name, now, today, &stats, &feed, &leaderboard))
}

/// GET /api/v1/public/display/{token}
pub async fn display_snapshot(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<impl IntoResponse> {
    let snapshot = load_snapshot(&state, &token).await?;
    Ok(Json(DataResponse { data: snapshot }))
}
