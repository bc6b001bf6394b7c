//! Route definitions for authenticated realtime reads.

use axum::routing::get;
use axum::Router;

use crate::handlers::realtime;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/realtime`. Any authenticated staff role.
///
/// ```text
/// GET /feed        -> live_feed
/// GET /stats       -> stats
/// GET /leaderboard -> leaderboard
/// GET /ws          -> dashboard_ws
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feed", get(realtime::live_feed))
        .route("/stats", get(realtime::stats))
        .route("/leaderboard", get(realtime::leaderboard))
        .route("/ws", get(ws::dashboard_ws))
}
