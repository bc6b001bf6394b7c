pub mod admin;
pub mod device;
pub mod health;
pub mod public;
pub mod realtime;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /device/taps                                 device tap (credential in body)
///
/// /admin/devices                               issue, list (admin)
/// /admin/devices/{id}/revoke                   revoke
/// /admin/devices/{id}/rotate                   rotate
/// /admin/pairing                               start, list active
/// /admin/pairing/{device_id}                   status, cancel
/// /admin/students/{id}/card                    unbind (DELETE)
/// /admin/attendance/manual                     manual attendance (POST)
/// /admin/display-tokens                        issue, list
/// /admin/display-tokens/{id}/revoke            revoke
/// /admin/outbox/stats                          pipeline counters
/// /admin/outbox/failed                         failed events (?limit, offset)
/// /admin/outbox/{id}/requeue                   requeue failed event
///
/// /realtime/feed                               today's feed (?class_id)
/// /realtime/stats                              today's stats (?class_id)
/// /realtime/leaderboard                        earliest arrivals
/// /realtime/ws                                 dashboard stream (?class_id, access_token)
///
/// /public/display/{token}                      public snapshot
/// /public/display/{token}/ws                   public stream
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/device", device::router())
        .nest("/admin", admin::router())
        .nest("/realtime", realtime::router())
        .nest("/public", public::router())
}
