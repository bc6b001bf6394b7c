//! Route definitions for token-gated public displays.

use axum::routing::get;
use axum::Router;

use crate::handlers::public_display;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/public`. No JWT; the path token is checked by the
/// handlers.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/display/{token}", get(public_display::display_snapshot))
        .route("/display/{token}/ws", get(ws::public_display_ws))
}
