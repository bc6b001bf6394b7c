use std::time::Duration;

use rollcall_events::Hub;

/// Interval between heartbeat pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn a task that asks the hub to ping every viewer periodically.
///
/// Runs until aborted at shutdown.
pub fn start_heartbeat(hub: Hub) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            interval.tick().await;
            tracing::trace!("Viewer heartbeat ping");
            hub.ping_all();
        }
    })
}
