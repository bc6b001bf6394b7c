//! Route definitions for device-facing endpoints.

use axum::routing::post;
use axum::Router;

use crate::handlers::attendance;
use crate::state::AppState;

/// Routes mounted at `/device`.
///
/// ```text
/// POST /taps -> submit_tap
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/taps", post(attendance::submit_tap))
}
