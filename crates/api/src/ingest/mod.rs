//! Device tap ingestion.
//!
//! Every tap enters through [`process_tap`]. After the credential check the
//! tap takes its device's turn in the [`DeviceGate`] and is routed by one
//! question: does the device have an unexpired pairing session?
//!
//! - yes: the card is bound to the session's student ([`pairing`]).
//! - no: the tap is an ordinary attendance read ([`attendance`]).
//!
//! The attendance path never reads or writes pairing state beyond that one
//! lookup.

pub mod attendance;
pub mod broadcast;
pub mod gate;
pub mod pairing;

use chrono::Utc;
use rollcall_core::attendance::{AttendanceStatus, TapKind};
use rollcall_core::credentials::{fingerprint, hash_secret, is_well_formed};
use rollcall_core::outbox::GuardianNotice;
use rollcall_core::types::{DbId, Timestamp};
use rollcall_db::models::device::Device;
use rollcall_db::models::outbox::NewOutboxEvent;
use rollcall_db::repositories::{DeviceRepo, OutboxRepo};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub use gate::DeviceGate;

/// Body of `POST /api/v1/device/taps`.
#[derive(Debug, Deserialize, Validate)]
pub struct TapRequest {
    #[serde(alias = "api_key")]
    #[validate(length(min = 1, max = 128))]
    pub credential: String,
    #[serde(alias = "rfid_code")]
    #[validate(length(min = 1, max = 64))]
    pub card_id: String,
    /// Device clock. Server time is used when absent.
    pub timestamp: Option<Timestamp>,
}

/// What a tap did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TapOutcome {
    CheckIn,
    CheckOut,
    AlreadyCheckedOut,
    Paired,
}

impl From<TapKind> for TapOutcome {
    fn from(kind: TapKind) -> Self {
        match kind {
            TapKind::CheckIn => Self::CheckIn,
            TapKind::CheckOut => Self::CheckOut,
            TapKind::AlreadyCheckedOut => Self::AlreadyCheckedOut,
        }
    }
}

/// Synchronous answer to the device.
#[derive(Debug, Clone, Serialize)]
pub struct TapResponse {
    #[serde(rename = "type")]
    pub outcome: TapOutcome,
    /// `None` for pairing taps.
    pub status: Option<AttendanceStatus>,
    pub checked_out: bool,
    pub student_id: DbId,
    pub student_name: String,
    pub time: Timestamp,
    pub message: String,
}

/// Resolve a device credential to an active device.
///
/// Unknown, inactive and malformed credentials are indistinguishable to the
/// caller and in the log line.
pub async fn authenticate_device(state: &AppState, credential: &str) -> AppResult<Device> {
    let reject = || {
        tracing::warn!(
            fingerprint = %fingerprint(credential),
            "Rejected device credential",
        );
        AppError::InvalidCredential
    };

    if !is_well_formed(credential) {
        return Err(reject());
    }

    match DeviceRepo::find_by_credential_hash(&state.pool, &hash_secret(credential)).await? {
        Some(device) if device.is_active => {
            DeviceRepo::touch_last_seen(&state.pool, device.id).await?;
            Ok(device)
        }
        _ => Err(reject()),
    }
}

/// Single entry point for device taps.
pub async fn process_tap(state: &AppState, request: TapRequest) -> AppResult<TapResponse> {
    request.validate()?;
    let device = authenticate_device(state, request.credential.trim()).await?;

    let card_id = request.card_id.trim();
    if card_id.is_empty() {
        return Err(AppError::BadRequest("card_id must not be blank".into()));
    }
    let at = request.timestamp.unwrap_or_else(Utc::now);

    let _turn = state.device_gate.enter(device.id).await;

    match state.pairing.active(device.id, Utc::now()) {
        Some(session) => pairing::complete(state, &device, session, card_id).await,
        None => attendance::record_tap(state, &device, card_id, at).await,
    }
}

/// Append a guardian notification to the outbox inside the caller's
/// transaction.
pub(crate) async fn record_notice(
    conn: &mut PgConnection,
    event_type: &'static str,
    notice: &GuardianNotice,
) -> AppResult<DbId> {
    let payload = serde_json::to_value(notice)
        .map_err(|e| AppError::InternalError(format!("Failed to encode notice: {e}")))?;
    let id = OutboxRepo::insert(
        conn,
        &NewOutboxEvent {
            tenant_id: notice.tenant_id,
            aggregate_id: notice.student_id,
            event_type,
            payload,
        },
    )
    .await?;
    Ok(id)
}
