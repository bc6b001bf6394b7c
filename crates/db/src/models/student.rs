//! Student rows as seen by the attendance pipeline.

use serde::Serialize;
use sqlx::FromRow;
use rollcall_core::pairing::CardOwner;
use rollcall_core::types::DbId;

/// A student joined with its class name.
///
/// `card_id` is the physical card bound by pairing; it is unique across the
/// whole system.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Student {
    pub id: DbId,
    pub tenant_id: DbId,
    pub class_id: Option<DbId>,
    pub class_name: Option<String>,
    pub name: String,
    pub student_number: Option<String>,
    pub card_id: Option<String>,
    pub is_active: bool,
}

impl Student {
    pub fn has_card(&self) -> bool {
        self.card_id.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn as_card_owner(&self) -> CardOwner {
        CardOwner {
            student_id: self.id,
            name: self.name.clone(),
        }
    }
}
