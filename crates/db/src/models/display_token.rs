use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;
use rollcall_core::types::{DbId, Timestamp};

/// A row from the `display_tokens` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DisplayToken {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub is_active: bool,
    pub expires_at: Option<Timestamp>,
    pub last_accessed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDisplayToken {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub expires_at: Option<Timestamp>,
}

/// Issuance response carrying the plaintext token once.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayTokenCreatedResponse {
    pub display_token: DisplayToken,
    pub token: String,
}

/// A validated token joined with its tenant's name.
#[derive(Debug, Clone, FromRow)]
pub struct ResolvedDisplayToken {
    pub id: DbId,
    pub tenant_id: DbId,
    pub tenant_name: String,
    pub is_active: bool,
    pub expires_at: Option<Timestamp>,
}
