//! Rollcall fan-out and delivery infrastructure.
//!
//! - [`Hub`]: in-process broadcast of attendance events to connected
//!   dashboard and public-display viewers, owned by a single task.
//! - [`OutboxWorker`]: drains the transactional outbox and delivers each
//!   event through a [`Notifier`], with retry and backoff.
//! - [`delivery`]: the guardian push notifier and its FCM HTTP v1 client.

pub mod delivery;
pub mod hub;
pub mod outbox;

pub use delivery::{DeliveryError, Notifier, PushNotifier};
pub use hub::{Audience, Hub, HubConfig, HubError, Outbound, Viewer, ViewerId, ViewerScope};
pub use outbox::{OutboxStore, OutboxWorker, PgOutboxStore, WorkerConfig};
