//! WebSocket endpoints for live viewers.
//!
//! Both dashboards and public displays are viewers of the broadcast hub;
//! they differ only in the scope they register with.

mod handler;
mod heartbeat;
pub mod messages;

pub use handler::{dashboard_ws, public_display_ws};
pub use heartbeat::start_heartbeat;
