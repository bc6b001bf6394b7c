//! Delivery of claimed outbox events to guardians.

pub mod fcm;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rollcall_core::outbox::GuardianNotice;
use rollcall_db::models::outbox::OutboxEvent;
use rollcall_db::repositories::PushTokenRepo;
use sqlx::PgPool;

use self::fcm::{FcmClient, FcmConfig, FcmError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Try again later; counts against the retry budget.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Retrying cannot help; the event is marked failed immediately.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

/// Delivers one outbox event.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, event: &OutboxEvent) -> Result<(), DeliveryError>;
}

// ---------------------------------------------------------------------------
// Push notifier
// ---------------------------------------------------------------------------

/// Sends a push notification to every active guardian token of the student.
pub struct PushNotifier {
    pool: PgPool,
    provider: Option<Arc<FcmClient>>,
}

impl PushNotifier {
    /// `provider = None` disables sending; events are then acknowledged
    /// without contacting anyone.
    pub fn new(pool: PgPool, provider: Option<Arc<FcmClient>>) -> Self {
        Self { pool, provider }
    }

    /// Configure the FCM provider from the environment, or run without one
    /// when `FCM_PROJECT_ID` / `FCM_SERVICE_ACCOUNT_KEY` are unset.
    pub async fn from_env(pool: PgPool) -> Result<Self, FcmError> {
        let provider = match FcmConfig::from_env() {
            Some(config) => {
                let client = FcmClient::from_config(&config).await?;
                tracing::info!(project_id = %config.project_id, "FCM push delivery enabled");
                Some(Arc::new(client))
            }
            None => {
                tracing::warn!("FCM not configured, guardian notifications will be acknowledged without sending");
                None
            }
        };
        Ok(Self::new(pool, provider))
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    async fn deliver(&self, event: &OutboxEvent) -> Result<(), DeliveryError> {
        let notice: GuardianNotice = serde_json::from_value(event.payload.clone())
            .map_err(|e| DeliveryError::Permanent(format!("unreadable payload: {e}")))?;

        let tokens = PushTokenRepo::list_active_for_student(&self.pool, notice.student_id)
            .await
            .map_err(|e| DeliveryError::Transient(format!("token lookup failed: {e}")))?;
        if tokens.is_empty() {
            tracing::debug!(event_id = event.id, student_id = notice.student_id, "No guardian tokens, nothing to send");
            return Ok(());
        }

        let Some(provider) = &self.provider else {
            tracing::info!(event_id = event.id, "Push provider not configured, skipping notification");
            return Ok(());
        };

        let text = notice.render(&event.event_type);
        let data = HashMap::from([
            ("notification_id".to_string(), event.id.to_string()),
            ("type".to_string(), event.event_type.clone()),
            ("student_id".to_string(), notice.student_id.to_string()),
        ]);

        let mut summary = SendSummary::default();
        for token in &tokens {
            let result = provider.send(&token.token, &text, &data).await;
            summary.record(&token.token, result);
        }

        for token in &summary.rejected {
            match PushTokenRepo::deactivate(&self.pool, token).await {
                Ok(_) => tracing::info!(event_id = event.id, "Deactivated rejected guardian token"),
                Err(e) => tracing::warn!(event_id = event.id, error = %e, "Failed to deactivate token"),
            }
        }

        tracing::debug!(
            event_id = event.id,
            delivered = summary.delivered,
            rejected = summary.rejected.len(),
            failed = summary.errors.len(),
            "Push fan-out finished"
        );
        summary.outcome()
    }
}

/// Per-token results of one fan-out.
#[derive(Debug, Default)]
pub struct SendSummary {
    pub delivered: usize,
    /// Tokens the provider no longer accepts.
    pub rejected: Vec<String>,
    pub errors: Vec<FcmError>,
}

impl SendSummary {
    pub fn record(&mut self, token: &str, result: Result<String, FcmError>) {
        match result {
            Ok(_) => self.delivered += 1,
            Err(FcmError::TokenRejected { .. }) => self.rejected.push(token.to_string()),
            Err(e) => self.errors.push(e),
        }
    }

    /// Any transient error retries the event. Rejected tokens alone do not.
    pub fn outcome(&self) -> Result<(), DeliveryError> {
        if let Some(e) = self.errors.iter().find(|e| e.is_transient()) {
            return Err(DeliveryError::Transient(e.to_string()));
        }
        match self.errors.first() {
            Some(e) if self.delivered == 0 => Err(DeliveryError::Permanent(e.to_string())),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn rejected() -> Result<String, FcmError> {
        Err(FcmError::TokenRejected {
            code: "UNREGISTERED".into(),
        })
    }

    fn api(status: u16) -> Result<String, FcmError> {
        Err(FcmError::Api {
            status,
            message: "boom".into(),
        })
    }

    #[test]
    fn rejected_tokens_do_not_fail_delivery() {
        let mut summary = SendSummary::default();
        summary.record("a", Ok("m1".into()));
        summary.record("b", rejected());
        assert_eq!(summary.rejected, vec!["b".to_string()]);
        assert_eq!(summary.outcome(), Ok(()));
    }

    #[test]
    fn any_transient_error_retries_event() {
        let mut summary = SendSummary::default();
        summary.record("a", Ok("m1".into()));
        summary.record("b", api(503));
        assert_matches!(summary.outcome(), Err(DeliveryError::Transient(_)));
    }

    #[test]
    fn permanent_error_with_no_delivery_fails_event() {
        let mut summary = SendSummary::default();
        summary.record("a", api(400));
        assert_matches!(summary.outcome(), Err(DeliveryError::Permanent(_)));
    }

    #[test]
    fn permanent_error_after_partial_delivery_is_accepted() {
        let mut summary = SendSummary::default();
        summary.record("a", Ok("m1".into()));
        summary.record("b", api(400));
        assert_eq!(summary.outcome(), Ok(()));
    }

    #[test]
    fn all_rejected_is_still_success() {
        let mut summary = SendSummary::default();
        summary.record("a", rejected());
        summary.record("b", rejected());
        assert_eq!(summary.rejected.len(), 2);
        assert_eq!(summary.outcome(), Ok(()));
    }
}
