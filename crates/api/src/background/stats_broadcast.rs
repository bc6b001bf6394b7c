//! Periodic stats and leaderboard push.
//!
//! Arrivals already carry fresh stats; this loop covers everything else
//! that moves the numbers (manual absences, midnight rollover, late
//! joiners) for tenants that currently have viewers.

use std::time::Duration;

use chrono::Utc;
use rollcall_core::realtime::{HubEvent, LEADERBOARD_SIZE};
use rollcall_core::types::DbId;
use rollcall_db::repositories::RealtimeRepo;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// Run the broadcast loop until `cancel` is triggered.
pub async fn run(state: AppState, cancel: CancellationToken) {
    let every = Duration::from_secs(state.config.stats_broadcast_interval_secs.max(1));
    tracing::info!(interval_secs = every.as_secs(), "Stats broadcaster started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stats broadcaster stopping");
                break;
            }
            _ = interval.tick() => {
                let tenants = match state.hub.active_tenants().await {
                    Ok(tenants) => tenants,
                    Err(e) => {
                        tracing::warn!(error = %e, "Hub unavailable, stats broadcaster stopping");
                        break;
                    }
                };
                for tenant_id in tenants {
                    push_tenant(&state, tenant_id).await;
                }
            }
        }
    }
}

async fn push_tenant(state: &AppState, tenant_id: DbId) {
    let today = state.clock.local_date(Utc::now());

    match RealtimeRepo::stats(&state.pool, tenant_id, None, today).await {
        Ok(stats) => state.hub.publish(HubEvent::stats_update(tenant_id, stats)),
        Err(e) => tracing::error!(tenant_id, error = %e, "Stats broadcast: query failed"),
    }

    match RealtimeRepo::leaderboard(&state.pool, tenant_id, today, LEADERBOARD_SIZE as i64).await {
        Ok(entries) => state
            .hub
            .publish(HubEvent::leaderboard_update(tenant_id, entries)),
        Err(e) => tracing::error!(tenant_id, error = %e, "Leaderboard broadcast: query failed"),
    }
}
