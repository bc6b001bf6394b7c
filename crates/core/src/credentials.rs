//! Bearer-secret generation and hashing for device credentials and public
//! display tokens.
//!
//! Both secrets follow the same rules: 32 bytes from the thread-local CSPRNG,
//! rendered as 64 lowercase hex characters, shown to the administrator once,
//! and persisted only as a SHA-256 hex digest. Lookups hash the presented
//! value and match on the digest, so a database leak does not expose usable
//! credentials.

use rand::Rng;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of random bytes in a generated secret.
pub const SECRET_BYTES: usize = 32;

/// Length of the rendered secret (two hex characters per byte).
pub const SECRET_LENGTH: usize = SECRET_BYTES * 2;

/// Number of leading hash characters used as a log-safe fingerprint.
pub const FINGERPRINT_LENGTH: usize = 8;

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// A freshly generated secret.
pub struct GeneratedSecret {
    /// The plaintext value (returned to the caller exactly once, never stored).
    pub plaintext: String,
    /// The SHA-256 hex digest of the plaintext (stored in the database).
    pub hash: String,
}

/// Generate a new random secret suitable for a device credential or a
/// display token.
pub fn generate_secret() -> GeneratedSecret {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill(&mut bytes[..]);

    let plaintext = hex::encode(bytes);
    let hash = hash_secret(&plaintext);

    GeneratedSecret { plaintext, hash }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Compute the SHA-256 hex digest of a presented secret.
///
/// Used at issuance (to store the hash) and at validation (to look the
/// secret up by hash).
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.trim().as_bytes()))
}

/// Short, non-reversible identifier of a presented secret for audit logs.
///
/// Derived from the hash, never from the plaintext, so logging it leaks
/// nothing an attacker could replay.
pub fn fingerprint(secret: &str) -> String {
    let hash = hash_secret(secret);
    hash[..FINGERPRINT_LENGTH].to_string()
}

/// Cheap shape check applied before any database lookup.
///
/// Anything that cannot possibly be a generated secret is rejected without
/// touching the store.
pub fn is_well_formed(secret: &str) -> bool {
    let secret = secret.trim();
    secret.len() == SECRET_LENGTH && secret.chars().all(|c| c.is_ascii_hexdigit())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
