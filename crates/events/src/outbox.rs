//! Outbox delivery worker.
//!
//! [`OutboxWorker`] polls for due `pending` events, leases a batch, hands
//! each event to a [`Notifier`], and records the result. Failures are retried
//! with exponential backoff until the retry budget runs out, after which the
//! event is marked `failed` and left for an operator to requeue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rollcall_core::outbox::{RetryDecision, RetryPolicy};
use rollcall_core::types::DbId;
use rollcall_db::models::outbox::OutboxEvent;
use rollcall_db::repositories::OutboxRepo;
use rollcall_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::delivery::{DeliveryError, Notifier};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Status transitions the worker needs from storage.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn claim_due(&self, limit: i64, lease: Duration) -> Result<Vec<OutboxEvent>, sqlx::Error>;
    async fn mark_published(&self, id: DbId) -> Result<(), sqlx::Error>;
    async fn schedule_retry(
        &self,
        id: DbId,
        retry_count: i32,
        delay: Duration,
        error: &str,
    ) -> Result<(), sqlx::Error>;
    async fn mark_failed(&self, id: DbId, retry_count: i32, error: &str) -> Result<(), sqlx::Error>;
}

pub struct PgOutboxStore {
    pool: DbPool,
}

impl PgOutboxStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn claim_due(&self, limit: i64, lease: Duration) -> Result<Vec<OutboxEvent>, sqlx::Error> {
        OutboxRepo::claim_due(&self.pool, limit, lease.as_secs_f64()).await
    }

    async fn mark_published(&self, id: DbId) -> Result<(), sqlx::Error> {
        OutboxRepo::mark_published(&self.pool, id).await
    }

    async fn schedule_retry(
        &self,
        id: DbId,
        retry_count: i32,
        delay: Duration,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        OutboxRepo::schedule_retry(&self.pool, id, retry_count, delay.as_secs_f64(), error).await
    }

    async fn mark_failed(&self, id: DbId, retry_count: i32, error: &str) -> Result<(), sqlx::Error> {
        OutboxRepo::mark_failed(&self.pool, id, retry_count, error).await
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    /// How long a claimed batch stays invisible to other workers.
    pub lease: Duration,
    pub retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            batch_size: 50,
            lease: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl WorkerConfig {
    /// Read `OUTBOX_*` overrides; anything unset or unparseable keeps its default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name-to-value source. Zero intervals, leases and batch
    /// sizes are treated as unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());
        let secs = |name: &str| var(name).filter(|n| *n > 0).map(Duration::from_secs);

        let defaults = Self::default();
        Self {
            poll_interval: secs("OUTBOX_POLL_INTERVAL_SECS").unwrap_or(defaults.poll_interval),
            batch_size: var("OUTBOX_BATCH_SIZE")
                .filter(|n| *n > 0)
                .and_then(|n| i64::try_from(n).ok())
                .unwrap_or(defaults.batch_size),
            lease: secs("OUTBOX_LEASE_SECS").unwrap_or(defaults.lease),
            retry: RetryPolicy {
                max_retries: var("OUTBOX_MAX_RETRIES")
                    .and_then(|n| n.try_into().ok())
                    .unwrap_or(defaults.retry.max_retries),
                initial_delay: secs("OUTBOX_INITIAL_BACKOFF_SECS")
                    .unwrap_or(defaults.retry.initial_delay),
                max_delay: secs("OUTBOX_MAX_BACKOFF_SECS").unwrap_or(defaults.retry.max_delay),
                multiplier: defaults.retry.multiplier,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Counts from one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub claimed: usize,
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
}

pub struct OutboxWorker {
    store: Arc<dyn OutboxStore>,
    notifier: Arc<dyn Notifier>,
    config: WorkerConfig,
}

impl OutboxWorker {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        notifier: Arc<dyn Notifier>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Poll until `cancel` fires. A full batch is followed immediately by
    /// another pass instead of waiting for the next tick.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            poll_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            max_retries = self.config.retry.max_retries,
            "Outbox worker started"
        );

        let period = self.config.poll_interval.max(Duration::from_millis(100));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Outbox worker stopping");
                    break;
                }
                _ = interval.tick() => {
                    loop {
                        match self.drain_once().await {
                            Ok(report) if report.claimed as i64 >= self.config.batch_size => {
                                if cancel.is_cancelled() {
                                    break;
                                }
                            }
                            Ok(_) => break,
                            Err(e) => {
                                tracing::error!(error = %e, "Outbox drain failed");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Claim one batch and attempt delivery of every event in it.
    pub async fn drain_once(&self) -> Result<DrainReport, sqlx::Error> {
        let events = self
            .store
            .claim_due(self.config.batch_size, self.config.lease)
            .await?;
        let mut report = DrainReport {
            claimed: events.len(),
            ..Default::default()
        };

        for event in &events {
            match self.notifier.deliver(event).await {
                Ok(()) => {
                    self.store.mark_published(event.id).await?;
                    report.published += 1;
                    tracing::debug!(event_id = event.id, event_type = %event.event_type, "Outbox event published");
                }
                Err(DeliveryError::Permanent(reason)) => {
                    let retry_count = event.retry_count.saturating_add(1);
                    self.store.mark_failed(event.id, retry_count, &reason).await?;
                    report.failed += 1;
                    tracing::warn!(event_id = event.id, error = %reason, "Outbox event failed permanently");
                }
                Err(DeliveryError::Transient(reason)) => {
                    match self.config.retry.after_failure(event.retry_count) {
                        RetryDecision::Retry { retry_count, delay } => {
                            self.store
                                .schedule_retry(event.id, retry_count, delay, &reason)
                                .await?;
                            report.retried += 1;
                            tracing::info!(
                                event_id = event.id,
                                retry_count,
                                delay_ms = delay.as_millis() as u64,
                                error = %reason,
                                "Outbox delivery failed, retrying"
                            );
                        }
                        RetryDecision::GiveUp { retry_count } => {
                            self.store.mark_failed(event.id, retry_count, &reason).await?;
                            report.failed += 1;
                            tracing::warn!(
                                event_id = event.id,
                                retry_count,
                                error = %reason,
                                "Outbox event exhausted retries"
                            );
                        }
                    }
                }
            }
        }

        if report.claimed > 0 {
            tracing::info!(
                claimed = report.claimed,
                published = report.published,
                retried = report.retried,
                failed = report.failed,
                "Outbox batch processed"
            );
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
