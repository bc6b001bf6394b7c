//! Rollcall API server library.
//!
//! Exposes config, state, error handling, routes, the tap ingestion entry
//! point and WebSocket plumbing so integration tests and the binary
//! entrypoint share them.

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod middleware;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
