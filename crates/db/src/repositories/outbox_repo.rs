//! Repository for the `outbox_events` table.
//!
//! `insert` is the only write a business transaction performs. Every status
//! transition after that belongs to the delivery worker and the operator
//! endpoints.

use sqlx::{PgConnection, PgPool};
use rollcall_core::outbox::OutboxStatus;
use rollcall_core::types::DbId;

use crate::models::outbox::{NewOutboxEvent, OutboxEvent, OutboxStats};

const COLUMNS: &str = "\
    id, tenant_id, aggregate_id, event_type, payload, status, retry_count, \
    next_attempt_at, locked_until, last_error, created_at, published_at";

pub struct OutboxRepo;

impl OutboxRepo {
    /// Append an event inside the caller's transaction.
    pub async fn insert(conn: &mut PgConnection, event: &NewOutboxEvent) -> Result<DbId, sqlx::Error> {
        let row: (DbId,) = sqlx::query_as(
            "INSERT INTO outbox_events (tenant_id, aggregate_id, event_type, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(event.tenant_id)
        .bind(event.aggregate_id)
        .bind(event.event_type)
        .bind(&event.payload)
        .fetch_one(conn)
        .await?;
        Ok(row.0)
    }

    /// Claim up to `limit` due events and lease them for `lease_secs`.
    ///
    /// `SKIP LOCKED` keeps concurrent workers off each other's rows; the lease
    /// lets another worker pick the rows up if this one dies mid-batch.
    pub async fn claim_due(
        pool: &PgPool,
        limit: i64,
        lease_secs: f64,
    ) -> Result<Vec<OutboxEvent>, sqlx::Error> {
        let query = format!(
            "UPDATE outbox_events SET locked_until = NOW() + make_interval(secs => $2) \
             WHERE id IN ( \
                 SELECT id FROM outbox_events \
                 WHERE status = 'pending' \
                   AND next_attempt_at <= NOW() \
                   AND (locked_until IS NULL OR locked_until < NOW()) \
                 ORDER BY next_attempt_at, id \
                 LIMIT $1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let mut events = sqlx::query_as::<_, OutboxEvent>(&query)
            .bind(limit)
            .bind(lease_secs)
            .fetch_all(pool)
            .await?;
        events.sort_by_key(|e| (e.next_attempt_at, e.id));
        Ok(events)
    }

    pub async fn mark_published(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE outbox_events \
             SET status = 'published', published_at = NOW(), locked_until = NULL, last_error = NULL \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt and push the next attempt `delay_secs` out.
    pub async fn schedule_retry(
        pool: &PgPool,
        id: DbId,
        retry_count: i32,
        delay_secs: f64,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE outbox_events \
             SET retry_count = $2, \
                 next_attempt_at = NOW() + make_interval(secs => $3), \
                 locked_until = NULL, \
                 last_error = $4 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(retry_count)
        .bind(delay_secs)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Retry budget exhausted.
    pub async fn mark_failed(
        pool: &PgPool,
        id: DbId,
        retry_count: i32,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE outbox_events \
             SET status = 'failed', retry_count = $2, locked_until = NULL, last_error = $3 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(retry_count)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list_by_status(
        pool: &PgPool,
        tenant_id: DbId,
        status: OutboxStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OutboxEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM outbox_events \
             WHERE tenant_id = $1 AND status = $2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, OutboxEvent>(&query)
            .bind(tenant_id)
            .bind(status.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Put a failed event back in the queue with a fresh retry budget.
    ///
    /// Returns `None` unless the event exists in the tenant and is failed.
    pub async fn requeue(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<OutboxEvent>, sqlx::Error> {
        let query = format!(
            "UPDATE outbox_events \
             SET status = 'pending', retry_count = 0, next_attempt_at = NOW(), \
                 locked_until = NULL \
             WHERE id = $1 AND tenant_id = $2 AND status = 'failed' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OutboxEvent>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn stats(pool: &PgPool, tenant_id: DbId) -> Result<OutboxStats, sqlx::Error> {
        sqlx::query_as::<_, OutboxStats>(
            "SELECT \
                 COUNT(*) FILTER (WHERE status = 'pending') AS pending, \
                 COUNT(*) FILTER (WHERE status = 'published') AS published, \
                 COUNT(*) FILTER (WHERE status = 'failed') AS failed \
             FROM outbox_events WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(pool)
        .await
    }
}
