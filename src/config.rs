//! Subsystem configuration.

use secrecy::SecretString;

/// Session tokens default to a 90-day TTL, mirrored by the cookie Max-Age.
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 90 * 24 * 60 * 60;

/// Route template the reset URL is built from; the plaintext token is
/// appended as the final path segment.
const DEFAULT_RESET_ROUTE: &str = "/api/v1/users/reset-password";

#[derive(Debug, Clone)]
pub struct AuthConfig {
    token_secret: SecretString,
    token_ttl_seconds: i64,
    reset_route: String,
}

impl AuthConfig {
    /// Build a config around the process-wide signing secret. The secret is
    /// read once at startup; rotation is out of scope.
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            reset_route: DEFAULT_RESET_ROUTE.to_string(),
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_route(mut self, route: String) -> Self {
        self.reset_route = route;
        self
    }

    #[must_use]
    pub fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn reset_route(&self) -> &str {
        &self.reset_route
    }
}
