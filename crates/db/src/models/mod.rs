//! Row structs and DTOs.
//!
//! Each submodule pairs a `FromRow` entity matching its table with the
//! create/response DTOs the API layer exchanges.

pub mod attendance;
pub mod device;
pub mod display_token;
pub mod outbox;
pub mod push_token;
pub mod realtime;
pub mod schedule;
pub mod student;
