use std::str::FromStr;

use rollcall_core::pairing::{RebindPolicy, DEFAULT_SESSION_TTL_SECS};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// Offset of the schools' wall clock from UTC, in minutes.
    pub utc_offset_minutes: i32,
    pub pairing: PairingConfig,
    /// Capacity of each live viewer's outbound queue.
    pub hub_viewer_queue_capacity: usize,
    pub stats_broadcast_interval_secs: u64,
    /// Run the outbox delivery loop inside this process.
    pub outbox_worker_enabled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PairingConfig {
    pub session_ttl_secs: i64,
    pub sweep_interval_secs: u64,
    pub rebind_policy: RebindPolicy,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            sweep_interval_secs: 30,
            rebind_policy: RebindPolicy::default(),
        }
    }
}

fn env_or<T>(name: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.into());
    raw.parse()
        .unwrap_or_else(|e| panic!("{name} must be valid ({raw:?}): {e}"))
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                 |
    /// |----------------------------------|-------------------------|
    /// | `HOST`                           | `0.0.0.0`               |
    /// | `PORT`                           | `3000`                  |
    /// | `CORS_ORIGINS`                   | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`           | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`          | `30`                    |
    /// | `ATTENDANCE_UTC_OFFSET_MINUTES`  | `0`                     |
    /// | `PAIRING_SESSION_TTL_SECS`       | `60`                    |
    /// | `PAIRING_SWEEP_INTERVAL_SECS`    | `30`                    |
    /// | `PAIRING_REBIND_POLICY`          | `require_unbind`        |
    /// | `HUB_VIEWER_QUEUE_CAPACITY`      | `64`                    |
    /// | `STATS_BROADCAST_INTERVAL_SECS`  | `30`                    |
    /// | `OUTBOX_WORKER_ENABLED`          | `true`                  |
    ///
    /// # Panics
    ///
    /// Panics on any value that does not parse, and when `JWT_SECRET` is
    /// missing.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let pairing = PairingConfig {
            session_ttl_secs: env_or("PAIRING_SESSION_TTL_SECS", "60"),
            sweep_interval_secs: env_or("PAIRING_SWEEP_INTERVAL_SECS", "30"),
            rebind_policy: env_or("PAIRING_REBIND_POLICY", "require_unbind"),
        };
        assert!(pairing.session_ttl_secs > 0, "PAIRING_SESSION_TTL_SECS must be positive");

        Self {
            host,
            port: env_or("PORT", "3000"),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", "30"),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", "30"),
            jwt: JwtConfig::from_env(),
            utc_offset_minutes: env_or("ATTENDANCE_UTC_OFFSET_MINUTES", "0"),
            pairing,
            hub_viewer_queue_capacity: env_or("HUB_VIEWER_QUEUE_CAPACITY", "64"),
            stats_broadcast_interval_secs: env_or("STATS_BROADCAST_INTERVAL_SECS", "30"),
            outbox_worker_enabled: env_or("OUTBOX_WORKER_ENABLED", "true"),
        }
    }
}
