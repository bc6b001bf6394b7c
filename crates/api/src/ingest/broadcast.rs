//! Live fan-out of freshly recorded attendance.
//!
//! Recorded arrivals are queued here after commit and drained by a single
//! task ([`crate::background::arrival_broadcast`]), so viewers see taps in
//! the order they were recorded.

use rollcall_core::realtime::LiveFeedEntry;
use rollcall_core::types::DbId;
use tokio::sync::mpsc;

use crate::state::AppState;

/// A committed attendance change waiting to be broadcast.
#[derive(Debug, Clone)]
pub struct Arrival {
    pub tenant_id: DbId,
    pub entry: LiveFeedEntry,
}

pub type ArrivalReceiver = mpsc::UnboundedReceiver<Arrival>;

/// Sending side of the arrival queue. Cheap to clone.
#[derive(Clone)]
pub struct ArrivalQueue {
    sender: mpsc::UnboundedSender<Arrival>,
}

impl ArrivalQueue {
    pub fn channel() -> (Self, ArrivalReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queue an arrival. Never blocks.
    pub fn push(&self, arrival: Arrival) {
        if self.sender.send(arrival).is_err() {
            tracing::debug!("Arrival broadcaster stopped, dropping event");
        }
    }
}

/// Queue a `new_attendance` event without holding up the request.
pub fn publish_attendance(state: &AppState, tenant_id: DbId, entry: LiveFeedEntry) {
    state.arrivals.push(Arrival { tenant_id, entry });
}
