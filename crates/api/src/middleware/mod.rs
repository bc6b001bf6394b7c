//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- staff user from a JWT (header or `access_token`
//!   query parameter for WebSocket upgrades).
//! - [`rbac::RequireAdmin`] -- requires the `admin` role.
//! - [`rbac::RequireAuth`] -- any authenticated staff user.

pub mod auth;
pub mod rbac;
