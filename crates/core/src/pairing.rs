//! Pairing Session Manager state.
//!
//! A pairing session binds the next card tapped on a device to a chosen
//! student. Sessions live only in memory, keyed by device id, and expire
//! after a short TTL. [`PairingTable`] is the only owner of that map; every
//! read and transition goes through its methods, each of which takes the
//! table lock once.
//!
//! Per device the lifecycle is `Idle -> Active -> {Completed, Cancelled,
//! Expired} -> Idle`. An expired session is treated as absent by every
//! method even before the periodic sweep removes it.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::types::{DbId, Timestamp};

/// Default session lifetime in seconds.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One active pairing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingSession {
    /// Distinguishes successive sessions on the same device.
    pub session_id: u64,
    pub device_id: DbId,
    pub tenant_id: DbId,
    pub student_id: DbId,
    pub student_name: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl PairingSession {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Whole seconds left before expiry, never negative.
    pub fn remaining_secs(&self, now: Timestamp) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PairingError {
    #[error("Device {device_id} already has an active pairing session for {student_name}")]
    SessionActive { device_id: DbId, student_name: String },

    #[error("Student {student_id} already has a card bound")]
    StudentAlreadyPaired { student_id: DbId },

    #[error("Card is already bound to student {owner_student_id} ({owner_name})")]
    CardAlreadyBound {
        owner_student_id: DbId,
        owner_name: String,
    },
}

// ---------------------------------------------------------------------------
// Rebind policy
// ---------------------------------------------------------------------------

/// What to do when the tapped card already belongs to another student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebindPolicy {
    /// Reject; an administrator must unbind the card first.
    #[default]
    RequireUnbind,
    /// Move the card to the session's student in the same transaction.
    ForceRebind,
}

impl FromStr for RebindPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "require_unbind" => Ok(Self::RequireUnbind),
            "force_rebind" => Ok(Self::ForceRebind),
            other => Err(format!(
                "unknown rebind policy '{other}' (expected require_unbind or force_rebind)"
            )),
        }
    }
}

/// Current owner of a card, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardOwner {
    pub student_id: DbId,
    pub name: String,
}

/// The write a pairing tap should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardBinding {
    /// Card unused: bind it to the session's student.
    Bind,
    /// Card already belongs to the session's student: nothing to write.
    AlreadyOwn,
    /// Card moves from `from_student_id` to the session's student.
    Rebind { from_student_id: DbId },
}

/// Decide how a tapped card binds to `session_student_id`.
pub fn resolve_card_binding(
    policy: RebindPolicy,
    session_student_id: DbId,
    current_owner: Option<&CardOwner>,
) -> Result<CardBinding, PairingError> {
    match current_owner {
        None => Ok(CardBinding::Bind),
        Some(owner) if owner.student_id == session_student_id => Ok(CardBinding::AlreadyOwn),
        Some(owner) => match policy {
            RebindPolicy::RequireUnbind => Err(PairingError::CardAlreadyBound {
                owner_student_id: owner.student_id,
                owner_name: owner.name.clone(),
            }),
            RebindPolicy::ForceRebind => Ok(CardBinding::Rebind {
                from_student_id: owner.student_id,
            }),
        },
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Request to open a session.
#[derive(Debug, Clone)]
pub struct NewPairingSession {
    pub device_id: DbId,
    pub tenant_id: DbId,
    pub student_id: DbId,
    pub student_name: String,
}

/// In-memory session table, at most one live session per device.
pub struct PairingTable {
    ttl: chrono::Duration,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<DbId, PairingSession>>,
}

impl PairingTable {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            ttl,
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DbId, PairingSession>> {
        // No method panics while holding the guard, so a poisoned lock still
        // holds a consistent map.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a session, replacing an expired one if present.
    pub fn start(
        &self,
        request: NewPairingSession,
        now: Timestamp,
    ) -> Result<PairingSession, PairingError> {
        let mut sessions = self.lock();

        if let Some(existing) = sessions.get(&request.device_id) {
            if !existing.is_expired(now) {
                return Err(PairingError::SessionActive {
                    device_id: request.device_id,
                    student_name: existing.student_name.clone(),
                });
            }
        }

        let session = PairingSession {
            session_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            device_id: request.device_id,
            tenant_id: request.tenant_id,
            student_id: request.student_id,
            student_name: request.student_name,
            created_at: now,
            expires_at: now + self.ttl,
        };
        sessions.insert(session.device_id, session.clone());
        Ok(session)
    }

    /// The unexpired session on `device_id`, if any.
    pub fn active(&self, device_id: DbId, now: Timestamp) -> Option<PairingSession> {
        self.lock()
            .get(&device_id)
            .filter(|s| !s.is_expired(now))
            .cloned()
    }

    /// Remove the session after a successful binding.
    ///
    /// Only removes it if it is still the same session; returns whether it did.
    pub fn complete(&self, device_id: DbId, session_id: u64) -> bool {
        let mut sessions = self.lock();
        match sessions.get(&device_id) {
            Some(s) if s.session_id == session_id => {
                sessions.remove(&device_id);
                true
            }
            _ => false,
        }
    }

    /// Cancel whatever session the device has. Idempotent.
    pub fn cancel(&self, device_id: DbId) -> Option<PairingSession> {
        self.lock().remove(&device_id)
    }

    /// Drop every session past its expiry and return them.
    pub fn sweep_expired(&self, now: Timestamp) -> Vec<PairingSession> {
        let mut sessions = self.lock();
        let expired: Vec<DbId> = sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.device_id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| sessions.remove(&id))
            .collect()
    }

    /// Unexpired sessions of one tenant, ordered by device id.
    pub fn list_active(&self, tenant_id: DbId, now: Timestamp) -> Vec<PairingSession> {
        let mut list: Vec<PairingSession> = self
            .lock()
            .values()
            .filter(|s| s.tenant_id == tenant_id && !s.is_expired(now))
            .cloned()
            .collect();
        list.sort_by_key(|s| s.device_id);
        list
    }

    /// Number of stored sessions, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PairingTable {
    fn default() -> Self {
        Self::new(chrono::Duration::seconds(DEFAULT_SESSION_TTL_SECS))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap()
    }

    fn request(device_id: DbId, student_id: DbId) -> NewPairingSession {
        NewPairingSession {
            device_id,
            tenant_id: 1,
            student_id,
            student_name: format!("Student {student_id}"),
        }
    }

    #[test]
    fn start_then_active() {
        let table = PairingTable::default();
        let session = table.start(request(10, 100), t0()).unwrap();
        assert_eq!(session.expires_at, t0() + Duration::seconds(60));
        assert_eq!(table.active(10, t0()).unwrap().student_id, 100);
        assert!(table.active(11, t0()).is_none());
    }

    #[test]
    fn second_start_on_active_device_is_rejected() {
        let table = PairingTable::default();
        table.start(request(10, 100), t0()).unwrap();
        let err = table.start(request(10, 200), t0() + Duration::seconds(5)).unwrap_err();
        assert_matches!(err, PairingError::SessionActive { device_id: 10, .. });
        assert_eq!(table.active(10, t0()).unwrap().student_id, 100);
    }

    #[test]
    fn expired_session_can_be_replaced() {
        let table = PairingTable::default();
        table.start(request(10, 100), t0()).unwrap();
        let later = t0() + Duration::seconds(60);
        assert!(table.active(10, later).is_none());
        let session = table.start(request(10, 200), later).unwrap();
        assert_eq!(session.student_id, 200);
    }

    #[test]
    fn complete_only_removes_matching_session() {
        let table = PairingTable::default();
        let first = table.start(request(10, 100), t0()).unwrap();
        table.cancel(10);
        let second = table.start(request(10, 200), t0()).unwrap();
        assert!(!table.complete(10, first.session_id));
        assert!(table.active(10, t0()).is_some());
        assert!(table.complete(10, second.session_id));
        assert!(table.active(10, t0()).is_none());
    }

    #[test]
    fn cancel_is_idempotent() {
        let table = PairingTable::default();
        table.start(request(10, 100), t0()).unwrap();
        assert!(table.cancel(10).is_some());
        assert!(table.cancel(10).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn sweep_removes_only_expired() {
        let table = PairingTable::new(Duration::seconds(60));
        table.start(request(10, 100), t0()).unwrap();
        table.start(request(11, 101), t0() + Duration::seconds(40)).unwrap();
        let swept = table.sweep_expired(t0() + Duration::seconds(61));
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].device_id, 10);
        assert_eq!(table.len(), 1);
        assert!(table.active(11, t0() + Duration::seconds(61)).is_some());
    }

    #[test]
    fn list_active_is_tenant_scoped() {
        let table = PairingTable::default();
        table.start(request(12, 100), t0()).unwrap();
        table.start(request(10, 101), t0()).unwrap();
        let mut other = request(11, 102);
        other.tenant_id = 2;
        table.start(other, t0()).unwrap();

        let listed: Vec<DbId> = table.list_active(1, t0()).iter().map(|s| s.device_id).collect();
        assert_eq!(listed, vec![10, 12]);
    }

    #[test]
    fn remaining_secs_never_negative() {
        let table = PairingTable::default();
        let s = table.start(request(10, 100), t0()).unwrap();
        assert_eq!(s.remaining_secs(t0() + Duration::seconds(15)), 45);
        assert_eq!(s.remaining_secs(t0() + Duration::seconds(90)), 0);
    }

    #[test]
    fn concurrent_starts_admit_exactly_one() {
        let table = Arc::new(PairingTable::default());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || table.start(request(10, 100 + i), t0()).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
    }

    // -- card binding -------------------------------------------------------

    fn owner(id: DbId) -> CardOwner {
        CardOwner {
            student_id: id,
            name: "Alice".into(),
        }
    }

    #[test]
    fn unused_card_binds() {
        for policy in [RebindPolicy::RequireUnbind, RebindPolicy::ForceRebind] {
            assert_eq!(resolve_card_binding(policy, 7, None).unwrap(), CardBinding::Bind);
        }
    }

    #[test]
    fn own_card_is_a_no_op() {
        for policy in [RebindPolicy::RequireUnbind, RebindPolicy::ForceRebind] {
            assert_eq!(
                resolve_card_binding(policy, 7, Some(&owner(7))).unwrap(),
                CardBinding::AlreadyOwn
            );
        }
    }

    #[test]
    fn require_unbind_reports_current_owner() {
        let err = resolve_card_binding(RebindPolicy::RequireUnbind, 7, Some(&owner(3))).unwrap_err();
        assert_matches!(
            err,
            PairingError::CardAlreadyBound { owner_student_id: 3, ref owner_name } if owner_name == "Alice"
        );
    }

    #[test]
    fn force_rebind_moves_card() {
        assert_eq!(
            resolve_card_binding(RebindPolicy::ForceRebind, 7, Some(&owner(3))).unwrap(),
            CardBinding::Rebind { from_student_id: 3 }
        );
    }

    #[test]
    fn rebind_policy_parses() {
        assert_eq!("force_rebind".parse::<RebindPolicy>().unwrap(), RebindPolicy::ForceRebind);
        assert_eq!(" require_unbind ".parse::<RebindPolicy>().unwrap(), RebindPolicy::RequireUnbind);
        assert!("sometimes".parse::<RebindPolicy>().is_err());
        assert_eq!(RebindPolicy::default(), RebindPolicy::RequireUnbind);
    }
}
