//! Authenticated dashboard reads: today's feed, stats and leaderboard.
//!
//! These return the same shapes the live stream pushes, so a dashboard can
//! render its first frame before the WebSocket delivers anything.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use rollcall_core::realtime::{DASHBOARD_FEED_SIZE, LEADERBOARD_SIZE};
use rollcall_db::repositories::RealtimeRepo;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAuth;
use crate::query::ClassScopeParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/realtime/feed
pub async fn live_feed(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(scope): Query<ClassScopeParams>,
) -> AppResult<impl IntoResponse> {
    let today = state.clock.local_date(Utc::now());
    let feed = RealtimeRepo::live_feed(
        &state.pool,
        user.tenant_id,
        scope.class_id,
        today,
        DASHBOARD_FEED_SIZE as i64,
    )
    .await?;
    Ok(Json(DataResponse { data: feed }))
}

/// GET /api/v1/realtime/stats
pub async fn stats(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(scope): Query<ClassScopeParams>,
) -> AppResult<impl IntoResponse> {
    let today = state.clock.local_date(Utc::now());
    let stats = RealtimeRepo::stats(&state.pool, user.tenant_id, scope.class_id, today).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/realtime/leaderboard
///
/// Earliest arrivals across the whole tenant.
pub async fn leaderboard(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let today = state.clock.local_date(Utc::now());
    let entries =
        RealtimeRepo::leaderboard(&state.pool, user.tenant_id, today, LEADERBOARD_SIZE as i64)
            .await?;
    Ok(Json(DataResponse { data: entries }))
}
