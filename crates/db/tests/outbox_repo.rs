//! Integration tests for outbox claim/retry/fail transitions.

mod common;

use rollcall_core::outbox::{OutboxStatus, EVENT_ATTENDANCE_CHECK_IN};
use rollcall_db::models::outbox::NewOutboxEvent;
use rollcall_db::repositories::OutboxRepo;
use sqlx::PgPool;

async fn enqueue(pool: &PgPool, tenant_id: i64, aggregate_id: i64) -> i64 {
    let mut tx = pool.begin().await.unwrap();
    let id = OutboxRepo::insert(
        &mut tx,
        &NewOutboxEvent {
            tenant_id,
            aggregate_id,
            event_type: EVENT_ATTENDANCE_CHECK_IN,
            payload: serde_json::json!({ "student_id": aggregate_id }),
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    id
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn rolled_back_transaction_leaves_no_event(pool: PgPool) {
    let tenant = common::seed_tenant(&pool, "SMP 1").await;
    let mut tx = pool.begin().await.unwrap();
    OutboxRepo::insert(
        &mut tx,
        &NewOutboxEvent {
            tenant_id: tenant,
            aggregate_id: 1,
            event_type: EVENT_ATTENDANCE_CHECK_IN,
            payload: serde_json::json!({}),
        },
    )
    .await
    .unwrap();
    tx.rollback().await.unwrap();

    let stats = OutboxRepo::stats(&pool, tenant).await.unwrap();
    assert_eq!(stats.pending, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn claimed_rows_are_leased(pool: PgPool) {
    let tenant = common::seed_tenant(&pool, "SMP 1").await;
    let first = enqueue(&pool, tenant, 1).await;
    enqueue(&pool, tenant, 2).await;

    let claimed = OutboxRepo::claim_due(&pool, 10, 60.0).await.unwrap();
    assert_eq!(claimed.len(), 2);
    assert_eq!(claimed[0].id, first);
    assert!(claimed.iter().all(|e| e.locked_until.is_some()));

    // Leased rows are not handed out again.
    assert!(OutboxRepo::claim_due(&pool, 10, 60.0).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn retry_then_fail_then_requeue(pool: PgPool) {
    let tenant = common::seed_tenant(&pool, "SMP 1").await;
    let id = enqueue(&pool, tenant, 1).await;
    OutboxRepo::claim_due(&pool, 10, 60.0).await.unwrap();

    OutboxRepo::schedule_retry(&pool, id, 1, 3600.0, "provider down").await.unwrap();
    // Not due for an hour.
    assert!(OutboxRepo::claim_due(&pool, 10, 60.0).await.unwrap().is_empty());

    OutboxRepo::mark_failed(&pool, id, 5, "gave up").await.unwrap();
    let failed = OutboxRepo::list_by_status(&pool, tenant, OutboxStatus::Failed, 50, 0)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].last_error.as_deref(), Some("gave up"));
    assert_eq!(failed[0].retry_count, 5);

    let requeued = OutboxRepo::requeue(&pool, tenant, id).await.unwrap().unwrap();
    assert_eq!(requeued.status, "pending");
    assert_eq!(requeued.retry_count, 0);
    assert_eq!(OutboxRepo::claim_due(&pool, 10, 60.0).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn published_rows_are_final(pool: PgPool) {
    let tenant = common::seed_tenant(&pool, "SMP 1").await;
    let id = enqueue(&pool, tenant, 1).await;
    OutboxRepo::mark_published(&pool, id).await.unwrap();
    OutboxRepo::mark_failed(&pool, id, 1, "late failure").await.unwrap();

    let stats = OutboxRepo::stats(&pool, tenant).await.unwrap();
    assert_eq!(stats.published, 1);
    assert_eq!(stats.failed, 0);
    assert!(OutboxRepo::requeue(&pool, tenant, id).await.unwrap().is_none());
}
