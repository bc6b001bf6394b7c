pub mod attendance;
pub mod devices;
pub mod display_tokens;
pub mod outbox;
pub mod pairing;
pub mod public_display;
pub mod realtime;
