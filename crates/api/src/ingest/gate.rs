//! Per-device tap serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rollcall_core::types::DbId;
use tokio::sync::OwnedMutexGuard;

/// One async lane per device. Taps from the same device queue on the lane
/// in arrival order (tokio's mutex is FIFO); different devices never wait on
/// each other.
#[derive(Default)]
pub struct DeviceGate {
    lanes: Mutex<HashMap<DbId, Arc<tokio::sync::Mutex<()>>>>,
}

impl DeviceGate {
    /// Wait for the device's turn. The turn ends when the guard drops.
    pub async fn enter(&self, device_id: DbId) -> OwnedMutexGuard<()> {
        let lane = {
            let mut lanes = self.lanes.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(lanes.entry(device_id).or_default())
        };
        lane.lock_owned().await
    }

    #[cfg(test)]
    fn lanes(&self) -> usize {
        self.lanes.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
