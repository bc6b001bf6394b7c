//! Shared response envelope.
//!
//! Admin and realtime responses use `{ "data": ... }`. Device and public
//! display endpoints return their payloads bare, since those clients are
//! not the admin UI.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
