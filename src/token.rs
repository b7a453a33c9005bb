//! Signed session tokens (HS256 JWT) with a fixed TTL.
//!
//! Claims carry only the subject id and the issue time; the signing secret
//! is process-wide configuration read once at startup. Key rotation is out
//! of scope. Expiry is validated here against an explicit clock rather than
//! inside the JWT library, which keeps the boundary exact: a token issued at
//! `T` verifies for any instant in `[T, T+TTL)` and is expired from `T+TTL`.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Malformed structure or signature mismatch.
    #[error("invalid token")]
    Invalid,
    /// Structurally sound and correctly signed, but past its TTL.
    #[error("token expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("signing secret must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// The verified contents of a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: Uuid,
    pub issued_at: i64,
}

/// Issues and verifies session tokens for a single signing secret.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl TokenSigner {
    /// # Errors
    ///
    /// Returns [`TokenError::WeakSecret`] when the secret is shorter than 32
    /// bytes.
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Result<Self, TokenError> {
        let secret = secret.expose_secret();
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        })
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue a token for `subject`, valid from now for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if JWT encoding fails.
    pub fn issue(&self, subject: Uuid) -> Result<String, TokenError> {
        self.issue_at(subject, now_unix())
    }

    /// Issue a token with an explicit issue time.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if JWT encoding fails.
    pub fn issue_at(&self, subject: Uuid, issued_at: i64) -> Result<String, TokenError> {
        let claims = SessionClaims {
            sub: subject.to_string(),
            iat: issued_at,
            exp: issued_at + self.ttl_seconds,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    /// Verify a token against the current clock.
    ///
    /// # Errors
    ///
    /// [`TokenError::Invalid`] for malformed or badly signed tokens,
    /// [`TokenError::Expired`] once the TTL has elapsed.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        self.verify_at(token, now_unix())
    }

    /// Verify a token against an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`TokenSigner::verify`].
    pub fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedToken, TokenError> {
        // Expiry is checked below against the caller's clock; the library
        // only validates structure and signature.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = std::collections::HashSet::new();
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?;
        if now >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        let subject = Uuid::parse_str(&data.claims.sub).map_err(|_| TokenError::Invalid)?;
        Ok(VerifiedToken {
            subject,
            issued_at: data.claims.iat,
        })
    }
}

/// Current Unix time in seconds.
#[must_use]
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn signer(ttl_seconds: i64) -> Result<TokenSigner> {
        let secret = SecretString::from("0123456789abcdef0123456789abcdef");
        Ok(TokenSigner::new(&secret, ttl_seconds)?)
    }

    #[test]
    fn rejects_short_secrets() {
        let secret = SecretString::from("too-short");
        assert!(matches!(
            TokenSigner::new(&secret, 60),
            Err(TokenError::WeakSecret)
        ));
    }

    #[test]
    fn issued_token_verifies_with_subject_and_issue_time() -> Result<()> {
        let signer = signer(3_600)?;
        let subject = Uuid::new_v4();
        let token = signer.issue_at(subject, 1_000)?;
        let verified = signer.verify_at(&token, 1_000)?;
        assert_eq!(verified.subject, subject);
        assert_eq!(verified.issued_at, 1_000);
        Ok(())
    }

    #[test]
    fn token_is_valid_until_but_not_at_ttl_boundary() -> Result<()> {
        let signer = signer(600)?;
        let token = signer.issue_at(Uuid::new_v4(), 1_000)?;
        assert!(signer.verify_at(&token, 1_000).is_ok());
        assert!(signer.verify_at(&token, 1_599).is_ok());
        assert!(matches!(
            signer.verify_at(&token, 1_600),
            Err(TokenError::Expired)
        ));
        assert!(matches!(
            signer.verify_at(&token, 5_000),
            Err(TokenError::Expired)
        ));
        Ok(())
    }

    #[test]
    fn tampered_token_is_invalid() -> Result<()> {
        let signer = signer(600)?;
        let token = signer.issue_at(Uuid::new_v4(), 1_000)?;
        let mut tampered = token.clone();
        tampered.pop();
        assert!(matches!(
            signer.verify_at(&tampered, 1_000),
            Err(TokenError::Invalid)
        ));
        Ok(())
    }

    #[test]
    fn token_signed_with_another_secret_is_invalid() -> Result<()> {
        let signer = signer(600)?;
        let other_secret = SecretString::from("fedcba9876543210fedcba9876543210");
        let other = TokenSigner::new(&other_secret, 600)?;
        let token = other.issue_at(Uuid::new_v4(), 1_000)?;
        assert!(matches!(
            signer.verify_at(&token, 1_000),
            Err(TokenError::Invalid)
        ));
        Ok(())
    }

    #[test]
    fn garbage_is_invalid_not_expired() -> Result<()> {
        let signer = signer(600)?;
        assert!(matches!(
            signer.verify_at("not-a-token", 0),
            Err(TokenError::Invalid)
        ));
        Ok(())
    }
}
