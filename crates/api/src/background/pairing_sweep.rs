//! Expiry sweep for pairing sessions.
//!
//! Expired sessions are already ignored by every lookup; the sweep only
//! frees their slots so the table does not grow with abandoned sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rollcall_core::pairing::PairingTable;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(pairing: Arc<PairingTable>, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Pairing sweep started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Pairing sweep stopping");
                break;
            }
            _ = interval.tick() => {
                for session in pairing.sweep_expired(Utc::now()) {
                    tracing::info!(
                        device_id = session.device_id,
                        student_id = session.student_id,
                        "Pairing session expired",
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rollcall_core::pairing::NewPairingSession;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expired_sessions_are_removed() {
        let pairing = Arc::new(PairingTable::new(chrono::Duration::seconds(-1)));
        pairing
            .start(
                NewPairingSession {
                    device_id: 7,
                    tenant_id: 1,
                    student_id: 3,
                    student_name: "Budi".into(),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(pairing.len(), 1);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            Arc::clone(&pairing),
            Duration::from_secs(30),
            cancel.clone(),
        ));
        // First tick fires immediately.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(pairing.is_empty());

        cancel.cancel();
        task.await.unwrap();
    }
}
