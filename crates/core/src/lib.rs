//! Domain logic shared by every rollcall crate.
//!
//! Nothing in here touches the database, the network, or the wall clock:
//! callers pass timestamps in, so every rule is testable in isolation.

pub mod attendance;
pub mod credentials;
pub mod display;
pub mod error;
pub mod outbox;
pub mod pairing;
pub mod policy;
pub mod realtime;
pub mod roles;
pub mod schedule;
pub mod types;
