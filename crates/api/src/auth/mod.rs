//! Staff authentication primitives.
//!
//! Tokens are issued by the external identity service; this server only
//! validates them.

pub mod jwt;
