//! Broadcast Hub: tenant-scoped fan-out of live attendance events.
//!
//! One task owns the viewer registry. Every caller talks to it through a
//! [`Hub`] handle that only sends commands, so registration, removal and
//! publishing are serialized without any lock around the map.
//!
//! Each viewer gets a bounded outbound queue. Publishing never waits: a
//! viewer whose queue is full (or whose receiver is gone) is removed on the
//! spot, which drops the registry's sender and closes the queue for the
//! viewer's writer task. Removal is idempotent, so the queue closes once.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rollcall_core::display::sanitize_event;
use rollcall_core::realtime::HubEvent;
use rollcall_core::types::{DbId, Timestamp};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Default capacity of each viewer's outbound queue.
pub const DEFAULT_VIEWER_QUEUE_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// Which serialization a viewer receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Authenticated staff dashboard; full event.
    Dashboard,
    /// Token-gated public screen; sanitized event.
    Public,
}

/// What a viewer subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerScope {
    pub tenant_id: DbId,
    /// Only attendance events for this class (stats and leaderboard updates
    /// still pass).
    pub class_id: Option<DbId>,
    pub audience: Audience,
}

impl ViewerScope {
    pub fn dashboard(tenant_id: DbId, class_id: Option<DbId>) -> Self {
        Self {
            tenant_id,
            class_id,
            audience: Audience::Dashboard,
        }
    }

    pub fn public(tenant_id: DbId) -> Self {
        Self {
            tenant_id,
            class_id: None,
            audience: Audience::Public,
        }
    }

    fn accepts(&self, event: &HubEvent) -> bool {
        if event.tenant_id != self.tenant_id {
            return false;
        }
        match (self.class_id, &event.attendance) {
            (Some(wanted), Some(entry)) => entry.class_id == Some(wanted),
            _ => true,
        }
    }
}

/// A frame queued for a viewer's socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Pre-serialized JSON, shared between all viewers of one audience.
    Text(Arc<str>),
    Ping,
    Close,
}

/// A registered viewer's receiving end.
#[derive(Debug)]
pub struct Viewer {
    pub id: ViewerId,
    pub receiver: mpsc::Receiver<Outbound>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("Broadcast hub is not running")]
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub viewer_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            viewer_queue_capacity: DEFAULT_VIEWER_QUEUE_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum Command {
    Register {
        id: ViewerId,
        scope: ViewerScope,
        sender: mpsc::Sender<Outbound>,
        connected_at: Timestamp,
    },
    Unregister {
        id: ViewerId,
    },
    Publish(HubEvent),
    PingAll,
    ViewerCount {
        tenant_id: DbId,
        reply: oneshot::Sender<usize>,
    },
    TotalViewers {
        reply: oneshot::Sender<usize>,
    },
    ActiveTenants {
        reply: oneshot::Sender<Vec<DbId>>,
    },
    Shutdown {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to the hub task.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl Hub {
    /// Start the hub task. It runs until [`Hub::shutdown`] is called or every
    /// handle is dropped.
    pub fn spawn(config: HubConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(HubTask::default().run(rx));
        let hub = Self {
            commands: tx,
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity: config.viewer_queue_capacity.max(1),
        };
        (hub, task)
    }

    /// Add a viewer and return its queue.
    pub fn register(&self, scope: ViewerScope) -> Result<Viewer, HubError> {
        let id = ViewerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        self.commands
            .send(Command::Register {
                id,
                scope,
                sender,
                connected_at: chrono::Utc::now(),
            })
            .map_err(|_| HubError::Closed)?;
        Ok(Viewer { id, receiver })
    }

    /// Remove a viewer. Safe to call more than once or after the hub removed
    /// the viewer itself.
    pub fn unregister(&self, id: ViewerId) {
        let _ = self.commands.send(Command::Unregister { id });
    }

    /// Queue an event for fan-out. Never blocks.
    pub fn publish(&self, event: HubEvent) {
        if self.commands.send(Command::Publish(event)).is_err() {
            tracing::debug!("Broadcast hub stopped, dropping event");
        }
    }

    /// Queue a ping frame for every viewer.
    pub fn ping_all(&self) {
        let _ = self.commands.send(Command::PingAll);
    }

    pub async fn viewer_count(&self, tenant_id: DbId) -> Result<usize, HubError> {
        self.ask(|reply| Command::ViewerCount { tenant_id, reply }).await
    }

    pub async fn total_viewers(&self) -> Result<usize, HubError> {
        self.ask(|reply| Command::TotalViewers { reply }).await
    }

    /// Tenants with at least one viewer, ascending.
    pub async fn active_tenants(&self) -> Result<Vec<DbId>, HubError> {
        self.ask(|reply| Command::ActiveTenants { reply }).await
    }

    /// Send Close to every viewer, clear the registry, and stop the task.
    ///
    /// Returns how many viewers were closed.
    pub async fn shutdown(&self) -> Result<usize, HubError> {
        self.ask(|reply| Command::Shutdown { reply }).await
    }

    async fn ask<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, HubError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(build(reply)).map_err(|_| HubError::Closed)?;
        response.await.map_err(|_| HubError::Closed)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

struct ViewerSlot {
    scope: ViewerScope,
    sender: mpsc::Sender<Outbound>,
    connected_at: Timestamp,
}

#[derive(Default)]
struct HubTask {
    tenants: HashMap<DbId, HashMap<ViewerId, ViewerSlot>>,
    owners: HashMap<ViewerId, DbId>,
}

impl HubTask {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::info!("Broadcast hub started");

        while let Some(command) = commands.recv().await {
            match command {
                Command::Register {
                    id,
                    scope,
                    sender,
                    connected_at,
                } => self.register(id, scope, sender, connected_at),
                Command::Unregister { id } => {
                    self.remove(id);
                }
                Command::Publish(event) => self.publish(&event),
                Command::PingAll => self.ping_all(),
                Command::ViewerCount { tenant_id, reply } => {
                    let count = self.tenants.get(&tenant_id).map_or(0, HashMap::len);
                    let _ = reply.send(count);
                }
                Command::TotalViewers { reply } => {
                    let _ = reply.send(self.owners.len());
                }
                Command::ActiveTenants { reply } => {
                    let mut tenants: Vec<DbId> = self.tenants.keys().copied().collect();
                    tenants.sort_unstable();
                    let _ = reply.send(tenants);
                }
                Command::Shutdown { reply } => {
                    let count = self.close_all();
                    let _ = reply.send(count);
                    break;
                }
            }
        }

        tracing::info!("Broadcast hub stopped");
    }

    fn register(
        &mut self,
        id: ViewerId,
        scope: ViewerScope,
        sender: mpsc::Sender<Outbound>,
        connected_at: Timestamp,
    ) {
        self.tenants.entry(scope.tenant_id).or_default().insert(
            id,
            ViewerSlot {
                scope,
                sender,
                connected_at,
            },
        );
        self.owners.insert(id, scope.tenant_id);
        tracing::debug!(viewer = %id, tenant_id = scope.tenant_id, audience = ?scope.audience, "Viewer registered");
    }

    /// Drop a viewer's slot (and with it the sender). Returns whether the
    /// viewer was still registered.
    fn remove(&mut self, id: ViewerId) -> bool {
        let Some(tenant_id) = self.owners.remove(&id) else {
            return false;
        };
        if let Some(viewers) = self.tenants.get_mut(&tenant_id) {
            if let Some(slot) = viewers.remove(&id) {
                let connected_secs = (chrono::Utc::now() - slot.connected_at).num_seconds();
                tracing::debug!(viewer = %id, tenant_id, connected_secs, "Viewer unregistered");
            }
            if viewers.is_empty() {
                self.tenants.remove(&tenant_id);
            }
        }
        true
    }

    fn publish(&mut self, event: &HubEvent) {
        let Some(viewers) = self.tenants.get(&event.tenant_id) else {
            return;
        };

        let wants = |audience| {
            viewers
                .values()
                .any(|v| v.scope.audience == audience && v.scope.accepts(event))
        };
        let dashboard = wants(Audience::Dashboard).then(|| encode(event)).flatten();
        let public = wants(Audience::Public)
            .then(|| encode(&sanitize_event(event)))
            .flatten();

        let mut evicted = Vec::new();
        for (id, slot) in viewers {
            if !slot.scope.accepts(event) {
                continue;
            }
            let text = match slot.scope.audience {
                Audience::Dashboard => dashboard.as_ref(),
                Audience::Public => public.as_ref(),
            };
            let Some(text) = text else {
                continue;
            };
            if !offer(*id, &slot.sender, Outbound::Text(Arc::clone(text))) {
                evicted.push(*id);
            }
        }

        for id in evicted {
            self.remove(id);
        }
    }

    fn ping_all(&mut self) {
        let evicted: Vec<ViewerId> = self
            .tenants
            .values()
            .flat_map(|viewers| viewers.iter())
            .filter(|(id, slot)| !offer(**id, &slot.sender, Outbound::Ping))
            .map(|(id, _)| *id)
            .collect();
        tracing::debug!(viewers = self.owners.len(), evicted = evicted.len(), "Hub heartbeat");
        for id in evicted {
            self.remove(id);
        }
    }

    fn close_all(&mut self) -> usize {
        let count = self.owners.len();
        for slot in self.tenants.values().flat_map(HashMap::values) {
            let _ = slot.sender.try_send(Outbound::Close);
        }
        self.tenants.clear();
        self.owners.clear();
        tracing::info!(count, "Closed all viewers");
        count
    }
}

/// Try to enqueue without waiting. `false` means the viewer must go.
fn offer(id: ViewerId, sender: &mpsc::Sender<Outbound>, frame: Outbound) -> bool {
    match sender.try_send(frame) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(viewer = %id, "Viewer queue full, dropping slow viewer");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

fn encode<T: Serialize>(value: &T) -> Option<Arc<str>> {
    match serde_json::to_string(value) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize hub event");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use rollcall_core::attendance::{AttendanceStatus, TapKind};
    use rollcall_core::realtime::{AttendanceStats, LiveFeedEntry};

    use super::*;

    fn attendance(tenant_id: DbId, class_id: Option<DbId>) -> HubEvent {
        HubEvent::new_attendance(
            tenant_id,
            LiveFeedEntry {
                id: 1,
                student_id: 10,
                student_name: "Dewi".into(),
                class_id,
                class_name: Some("7A".into()),
                time: Utc::now(),
                status: AttendanceStatus::OnTime,
                kind: TapKind::CheckIn,
            },
            None,
            None,
        )
    }

    fn spawn_hub(capacity: usize) -> Hub {
        Hub::spawn(HubConfig {
            viewer_queue_capacity: capacity,
        })
        .0
    }

    /// Round-trip a query so every earlier command has been processed.
    async fn settle(hub: &Hub) {
        hub.total_viewers().await.unwrap();
    }

    fn text(frame: Outbound) -> serde_json::Value {
        match frame {
            Outbound::Text(json) => serde_json::from_str(&json).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn events_never_cross_tenants() {
        let hub = spawn_hub(8);
        let mut a = hub.register(ViewerScope::dashboard(1, None)).unwrap();
        let mut b = hub.register(ViewerScope::dashboard(2, None)).unwrap();

        hub.publish(attendance(1, Some(7)));
        settle(&hub).await;

        let received = text(a.receiver.try_recv().unwrap());
        assert_eq!(received["tenant_id"], 1);
        assert!(b.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn class_scope_filters_attendance_but_not_stats() {
        let hub = spawn_hub(8);
        let mut scoped = hub.register(ViewerScope::dashboard(1, Some(7))).unwrap();

        hub.publish(attendance(1, Some(8)));
        hub.publish(attendance(1, None));
        hub.publish(attendance(1, Some(7)));
        hub.publish(HubEvent::stats_update(1, AttendanceStats::default()));
        settle(&hub).await;

        let first = text(scoped.receiver.try_recv().unwrap());
        assert_eq!(first["attendance"]["class_id"], 7);
        let second = text(scoped.receiver.try_recv().unwrap());
        assert_eq!(second["type"], "stats_update");
        assert!(scoped.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn public_viewers_get_sanitized_events() {
        let hub = spawn_hub(8);
        let mut screen = hub.register(ViewerScope::public(1)).unwrap();

        hub.publish(attendance(1, Some(7)));
        settle(&hub).await;

        let Outbound::Text(json) = screen.receiver.try_recv().unwrap() else {
            panic!("expected text frame");
        };
        assert!(!json.contains("tenant_id"));
        assert!(!json.contains("student_id"));
        assert!(json.contains("Dewi"));
    }

    #[tokio::test]
    async fn slow_viewer_is_dropped_without_blocking_others() {
        let hub = spawn_hub(1);
        let mut slow = hub.register(ViewerScope::dashboard(1, None)).unwrap();
        let mut fast = hub.register(ViewerScope::dashboard(1, None)).unwrap();

        hub.publish(attendance(1, None));
        settle(&hub).await;
        fast.receiver.try_recv().unwrap();

        hub.publish(attendance(1, None));
        settle(&hub).await;

        assert_eq!(hub.viewer_count(1).await.unwrap(), 1);
        // The slow viewer still drains what it had, then sees the queue closed.
        assert_matches!(slow.receiver.recv().await, Some(Outbound::Text(_)));
        assert_eq!(slow.receiver.recv().await, None);
        assert_matches!(fast.receiver.try_recv(), Ok(Outbound::Text(_)));
    }

    #[tokio::test]
    async fn unregister_closes_queue_and_is_idempotent() {
        let hub = spawn_hub(8);
        let mut viewer = hub.register(ViewerScope::dashboard(1, None)).unwrap();
        hub.unregister(viewer.id);
        hub.unregister(viewer.id);
        settle(&hub).await;

        assert_eq!(viewer.receiver.recv().await, None);
        assert_eq!(hub.total_viewers().await.unwrap(), 0);
        assert!(hub.active_tenants().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unregister_racing_publish_is_safe() {
        let hub = spawn_hub(4);
        let viewers: Vec<Viewer> = (0..32)
            .map(|_| hub.register(ViewerScope::dashboard(1, None)).unwrap())
            .collect();

        let publisher = {
            let hub = hub.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    hub.publish(attendance(1, None));
                    tokio::task::yield_now().await;
                }
            })
        };
        for viewer in &viewers {
            hub.unregister(viewer.id);
        }
        publisher.await.unwrap();
        settle(&hub).await;

        assert_eq!(hub.total_viewers().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn counts_and_active_tenants() {
        let hub = spawn_hub(8);
        let _a = hub.register(ViewerScope::dashboard(3, None)).unwrap();
        let _b = hub.register(ViewerScope::public(3)).unwrap();
        let _c = hub.register(ViewerScope::dashboard(1, None)).unwrap();

        assert_eq!(hub.viewer_count(3).await.unwrap(), 2);
        assert_eq!(hub.viewer_count(9).await.unwrap(), 0);
        assert_eq!(hub.total_viewers().await.unwrap(), 3);
        assert_eq!(hub.active_tenants().await.unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn ping_reaches_every_viewer() {
        let hub = spawn_hub(8);
        let mut a = hub.register(ViewerScope::dashboard(1, None)).unwrap();
        let mut b = hub.register(ViewerScope::public(2)).unwrap();
        hub.ping_all();
        settle(&hub).await;

        assert_eq!(a.receiver.try_recv().unwrap(), Outbound::Ping);
        assert_eq!(b.receiver.try_recv().unwrap(), Outbound::Ping);
    }

    #[tokio::test]
    async fn shutdown_closes_everyone_and_stops() {
        let (hub, task) = Hub::spawn(HubConfig::default());
        let mut a = hub.register(ViewerScope::dashboard(1, None)).unwrap();

        assert_eq!(hub.shutdown().await.unwrap(), 1);
        assert_eq!(a.receiver.recv().await, Some(Outbound::Close));
        assert_eq!(a.receiver.recv().await, None);

        task.await.unwrap();
        assert_eq!(hub.total_viewers().await, Err(HubError::Closed));
        assert_matches!(
            hub.register(ViewerScope::dashboard(1, None)),
            Err(HubError::Closed)
        );
    }
}
