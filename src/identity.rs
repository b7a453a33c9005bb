//! Identity records and the typed updates the store applies to them.
//!
//! The credential digest and the reset-token digest are deliberately not
//! fields of [`Identity`]: default reads never carry them, and nothing that
//! serializes an identity can leak them. Digests are only reachable through
//! the explicit store lookups that request them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Closed role set for the resource service.
///
/// `Standard` is the default for every new identity. Role changes only
/// happen through the administrator-guarded role endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Standard,
    Operator,
    LeadOperator,
    Administrator,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Operator => "operator",
            Role::LeadOperator => "lead-operator",
            Role::Administrator => "administrator",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "standard" => Some(Role::Standard),
            "operator" => Some(Role::Operator),
            "lead-operator" => Some(Role::LeadOperator),
            "administrator" => Some(Role::Administrator),
            _ => None,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Standard
    }
}

/// A registered principal as returned by default store lookups.
///
/// Timestamps are Unix seconds, matching session-token `iat`/`exp`
/// granularity so the stale-session comparison needs no conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    /// Watermark set on every credential mutation after initial creation.
    pub credential_changed_at: Option<i64>,
    /// Expiry of the outstanding reset token, if one exists.
    pub reset_token_expires_at: Option<i64>,
}

impl Identity {
    /// True when a token issued at `issued_at` predates the last credential
    /// change. Equality counts as stale: the watermark is written one second
    /// in the past, so a token minted by the mutation itself stays valid.
    #[must_use]
    pub fn changed_credential_since(&self, issued_at: i64) -> bool {
        self.credential_changed_at
            .is_some_and(|changed_at| issued_at <= changed_at)
    }

    #[must_use]
    pub fn public(&self) -> PublicIdentity {
        PublicIdentity {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// The only serializable identity view. No credential material.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicIdentity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Fields for creating an identity. Initial creation carries no watermark.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub name: String,
    pub email: String,
    pub credential_digest: String,
    pub role: Role,
}

/// A partial update applied atomically by `IdentityStore::update`.
///
/// The pairings encode the invariants: a credential digest travels with its
/// watermark, and a reset-token digest travels with its expiry. The outer
/// `Option` on `reset_token` distinguishes "leave untouched" (`None`) from
/// "clear both fields" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct IdentityUpdate {
    pub credential: Option<(String, i64)>,
    pub reset_token: Option<Option<(String, i64)>>,
    pub active: Option<bool>,
    pub role: Option<Role>,
}

impl IdentityUpdate {
    #[must_use]
    pub fn set_reset_token(digest: String, expires_at: i64) -> Self {
        Self {
            reset_token: Some(Some((digest, expires_at))),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn clear_reset_token() -> Self {
        Self {
            reset_token: Some(None),
            ..Self::default()
        }
    }

    /// New credential digest plus watermark, clearing any outstanding reset
    /// token in the same write.
    #[must_use]
    pub fn rotate_credential(digest: String, changed_at: i64) -> Self {
        Self {
            credential: Some((digest, changed_at)),
            reset_token: Some(None),
            ..Self::default()
        }
    }
}
