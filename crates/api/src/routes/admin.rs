//! Route definitions for the `/admin` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{attendance, devices, display_tokens, outbox, pairing};
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// All routes require the `admin` role (enforced by handler extractors).
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/devices",
            get(devices::list_devices).post(devices::issue_device),
        )
        .route("/devices/{id}/revoke", post(devices::revoke_device))
        .route("/devices/{id}/rotate", post(devices::rotate_device))
        .route(
            "/pairing",
            get(pairing::list_pairing_sessions).post(pairing::start_pairing),
        )
        .route(
            "/pairing/{device_id}",
            get(pairing::pairing_status).delete(pairing::cancel_pairing),
        )
        .route("/students/{id}/card", delete(pairing::unbind_card))
        .route(
            "/attendance/manual",
            post(attendance::record_manual_attendance),
        )
        .route(
            "/display-tokens",
            get(display_tokens::list_display_tokens).post(display_tokens::issue_display_token),
        )
        .route(
            "/display-tokens/{id}/revoke",
            post(display_tokens::revoke_display_token),
        )
        .route("/outbox/stats", get(outbox::outbox_stats))
        .route("/outbox/failed", get(outbox::list_failed_events))
        .route("/outbox/{id}/requeue", post(outbox::requeue_event))
}
