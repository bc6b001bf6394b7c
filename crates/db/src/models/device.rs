//! Device (attendance terminal) models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;
use rollcall_core::types::{DbId, Timestamp};

/// A row from the `devices` table.
///
/// `credential_hash` is never serialized.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Device {
    pub id: DbId,
    pub tenant_id: DbId,
    pub code: String,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub is_active: bool,
    pub last_seen_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Request body for issuing a device credential.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDevice {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

/// Returned by issue and rotate. The only place the plaintext ever appears.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceCredentialResponse {
    pub device: Device,
    /// Shown once and never stored.
    pub credential: String,
}
