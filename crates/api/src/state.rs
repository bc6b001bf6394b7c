use std::sync::Arc;

use rollcall_core::pairing::PairingTable;
use rollcall_core::types::LocalClock;
use rollcall_events::Hub;

use crate::config::ServerConfig;
use crate::ingest::broadcast::ArrivalQueue;
use crate::ingest::DeviceGate;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind `Arc` or is itself a handle.
#[derive(Clone)]
pub struct AppState {
    pub pool: rollcall_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Live fan-out to dashboards and public displays.
    pub hub: Hub,
    /// Active pairing sessions, one per device.
    pub pairing: Arc<PairingTable>,
    /// Serializes taps per device.
    pub device_gate: Arc<DeviceGate>,
    /// Schools' wall clock.
    pub clock: LocalClock,
    /// Recorded attendance waiting for live fan-out.
    pub arrivals: ArrivalQueue,
}

impl AppState {
    pub fn new(
        pool: rollcall_db::DbPool,
        config: ServerConfig,
        hub: Hub,
        arrivals: ArrivalQueue,
    ) -> Self {
        let ttl = chrono::Duration::seconds(config.pairing.session_ttl_secs);
        let clock = LocalClock::from_offset_minutes(config.utc_offset_minutes);
        Self {
            pool,
            config: Arc::new(config),
            hub,
            pairing: Arc::new(PairingTable::new(ttl)),
            device_gate: Arc::new(DeviceGate::default()),
            clock,
            arrivals,
        }
    }
}
