//! Outbox rows and operator-facing summaries.

use serde::Serialize;
use sqlx::FromRow;
use rollcall_core::types::{DbId, Timestamp};

/// A row from the `outbox_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OutboxEvent {
    pub id: DbId,
    pub tenant_id: DbId,
    pub aggregate_id: DbId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub retry_count: i32,
    pub next_attempt_at: Timestamp,
    pub locked_until: Option<Timestamp>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub published_at: Option<Timestamp>,
}

/// Fields for a new outbox row.
#[derive(Debug, Clone)]
pub struct NewOutboxEvent {
    pub tenant_id: DbId,
    pub aggregate_id: DbId,
    pub event_type: &'static str,
    pub payload: serde_json::Value,
}

/// Row counts by status.
#[derive(Debug, Clone, Copy, Default, FromRow, Serialize)]
pub struct OutboxStats {
    pub pending: i64,
    pub published: i64,
    pub failed: i64,
}
