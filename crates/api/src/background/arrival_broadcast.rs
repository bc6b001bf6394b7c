//! Ordered fan-out of recorded attendance to live viewers.
//!
//! Each arrival is enriched with the tenant's current stats and leaderboard
//! before it reaches the hub. Tenants without viewers are skipped without
//! querying.

use chrono::Utc;
use rollcall_core::realtime::{HubEvent, LEADERBOARD_SIZE};
use rollcall_db::repositories::RealtimeRepo;
use tokio_util::sync::CancellationToken;

use crate::ingest::broadcast::{Arrival, ArrivalReceiver};
use crate::state::AppState;

/// Drain `arrivals` in order until `cancel` fires or every sender is gone.
pub async fn run(state: AppState, mut arrivals: ArrivalReceiver, cancel: CancellationToken) {
    tracing::info!("Arrival broadcaster started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Arrival broadcaster stopping");
                break;
            }
            arrival = arrivals.recv() => match arrival {
                Some(arrival) => fan_out(&state, arrival).await,
                None => break,
            },
        }
    }
}

async fn fan_out(state: &AppState, arrival: Arrival) {
    let Arrival { tenant_id, entry } = arrival;

    match state.hub.viewer_count(tenant_id).await {
        Ok(0) => return,
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(tenant_id, error = %e, "Hub unavailable, dropping arrival");
            return;
        }
    }

    let date = state.clock.local_date(Utc::now());

    let stats = match RealtimeRepo::stats(&state.pool, tenant_id, None, date).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!(tenant_id, error = %e, "Failed to compute stats for broadcast");
            None
        }
    };
    let leaderboard =
        match RealtimeRepo::leaderboard(&state.pool, tenant_id, date, LEADERBOARD_SIZE as i64)
            .await
        {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!(tenant_id, error = %e, "Failed to compute leaderboard for broadcast");
                None
            }
        };

    state
        .hub
        .publish(HubEvent::new_attendance(tenant_id, entry, stats, leaderboard));
}
