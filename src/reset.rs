//! Single-use password recovery tokens.
//!
//! The plaintext is high-entropy random data encoded URL-safe so it can ride
//! in a path segment; it goes to the user exactly once and is never stored.
//! Only its unsalted SHA-256 digest is persisted, which the store looks up
//! by exact match when a candidate comes back.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Reset tokens stay valid for ten minutes.
pub const RESET_TOKEN_TTL_SECONDS: i64 = 10 * 60;

const RESET_TOKEN_BYTES: usize = 32;

/// A freshly generated reset token: the plaintext for the user, the digest
/// for the store.
#[derive(Debug)]
pub struct ResetToken {
    pub plaintext: String,
    pub digest: String,
}

/// Generate a new reset token pair.
#[must_use]
pub fn generate() -> ResetToken {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let plaintext = Base64UrlUnpadded::encode_string(&bytes);
    let digest = digest(&plaintext);
    ResetToken { plaintext, digest }
}

/// Digest a candidate plaintext for comparison against the stored value.
///
/// Deterministic and unsalted: the digest doubles as the store lookup key.
#[must_use]
pub fn digest(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    Base64UrlUnpadded::encode_string(&hasher.finalize())
}

/// Expiry timestamp for a token issued at `now`.
#[must_use]
pub fn expiry_from(now: i64) -> i64 {
    now + RESET_TOKEN_TTL_SECONDS
}
