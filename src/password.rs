//! One-way password hashing with Argon2id.
//!
//! Each call generates a fresh random salt which the PHC output string
//! embeds, so no external salt storage exists. Verification parses the
//! stored string and recomputes; the comparison inside the argon2 crate is
//! constant-time.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use tracing::error;

/// Hash a plaintext password into a PHC-format Argon2id digest.
///
/// # Errors
///
/// Returns an error if the hasher itself fails; this is an internal fault,
/// never a property of the password.
pub fn hash_password(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(digest.to_string())
}

/// Verify a candidate password against a stored digest.
///
/// A malformed stored digest is indistinguishable from a mismatch at the
/// call site, but it is logged as corruption so the two remain separable in
/// operation.
#[must_use]
pub fn verify_password(plaintext: &str, digest: &str) -> bool {
    let parsed = match PasswordHash::new(digest) {
        Ok(parsed) => parsed,
        Err(err) => {
            error!("stored credential digest is malformed: {err}");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn verify_accepts_the_hashed_password() -> Result<()> {
        let digest = hash_password("longenough1")?;
        assert!(verify_password("longenough1", &digest));
        Ok(())
    }

    #[test]
    fn verify_rejects_a_different_password() -> Result<()> {
        let digest = hash_password("longenough1")?;
        assert!(!verify_password("longenough2", &digest));
        Ok(())
    }

    #[test]
    fn each_hash_uses_a_fresh_salt() -> Result<()> {
        let first = hash_password("longenough1")?;
        let second = hash_password("longenough1")?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn malformed_digest_reads_as_mismatch() {
        assert!(!verify_password("longenough1", "not-a-phc-string"));
        assert!(!verify_password("longenough1", ""));
    }
}
