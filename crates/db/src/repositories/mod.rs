//! Repository layer.
//!
//! Each repository is a zero-sized struct with async methods. Plain reads and
//! single-statement writes take `&PgPool`; methods that must join a caller's
//! transaction take `&mut PgConnection` (pass `&mut *tx`).

pub mod attendance_repo;
pub mod device_repo;
pub mod display_token_repo;
pub mod outbox_repo;
pub mod push_token_repo;
pub mod realtime_repo;
pub mod schedule_repo;
pub mod student_repo;

pub use attendance_repo::AttendanceRepo;
pub use device_repo::DeviceRepo;
pub use display_token_repo::DisplayTokenRepo;
pub use outbox_repo::OutboxRepo;
pub use push_token_repo::PushTokenRepo;
pub use realtime_repo::RealtimeRepo;
pub use schedule_repo::ScheduleRepo;
pub use student_repo::StudentRepo;
