use serde::Serialize;
use sqlx::FromRow;
use rollcall_core::types::DbId;

/// A row from `guardian_push_tokens`, maintained by the guardian app backend.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GuardianPushToken {
    pub id: DbId,
    pub student_id: DbId,
    pub token: String,
    pub is_active: bool,
}
