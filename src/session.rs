//! Session guard: token extraction, verification, and identity resolution.
//!
//! The bearer header wins over the cookie. Verification alone is not
//! enough: the resolved identity's credential watermark can invalidate a
//! token that is cryptographically sound, which is how a password change
//! kills every session issued before it without any server-side session
//! state.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

use crate::error::Error;
use crate::identity::Identity;
use crate::service::AuthService;

/// Cookie carrying the session token.
pub const SESSION_COOKIE_NAME: &str = "jwt";

/// Placeholder the logout cookie carries instead of a token.
const LOGOUT_COOKIE_VALUE: &str = "loggedout";
const LOGOUT_COOKIE_MAX_AGE_SECONDS: i64 = 10;

/// Resolve the request to an authenticated identity or fail.
///
/// # Errors
///
/// `MissingToken` when neither header nor cookie carries a token,
/// `InvalidToken`/`ExpiredToken` from verification, `IdentityGone` when the
/// subject no longer exists, `StaleSession` when the token predates the
/// last credential change.
pub async fn authenticate(service: &AuthService, headers: &HeaderMap) -> Result<Identity, Error> {
    let Some(token) = extract_token(headers) else {
        return Err(Error::MissingToken);
    };
    let verified = service.tokens().verify(&token)?;
    let Some(identity) = service.store().find_by_id(verified.subject).await? else {
        // Safe to disclose: the token already proved this id once existed.
        return Err(Error::IdentityGone);
    };
    if identity.changed_credential_since(verified.issued_at) {
        return Err(Error::StaleSession);
    }
    Ok(identity)
}

/// Non-fatal variant for personalization paths: every failure, including
/// store trouble, collapses to "no identity resolved".
pub async fn identify_if_present(service: &AuthService, headers: &HeaderMap) -> Option<Identity> {
    authenticate(service, headers).await.ok()
}

/// Extract a session token, preferring `Authorization: Bearer` over the
/// cookie.
#[must_use]
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    extract_cookie_token(headers)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn extract_cookie_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

/// True when the request arrived over a secure channel, directly or behind
/// a TLS-terminating proxy.
#[must_use]
pub fn request_is_secure(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// Build the `HttpOnly` session cookie. The Max-Age mirrors the token TTL
/// but is advisory only; the signed expiry inside the token is
/// authoritative.
///
/// # Errors
///
/// Returns an error if the token produces an invalid header value.
pub fn session_cookie(token: &str, ttl_seconds: i64, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Overwrite the session cookie with a short-lived placeholder. This is a
/// client-side hint only: the token itself stays valid until its TTL, since
/// no server-side revocation exists.
///
/// # Errors
///
/// Returns an error if the header value cannot be built.
pub fn logout_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={LOGOUT_COOKIE_VALUE}; Path=/; HttpOnly; SameSite=Lax; \
         Max-Age={LOGOUT_COOKIE_MAX_AGE_SECONDS}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
