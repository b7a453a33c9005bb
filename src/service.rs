//! Credential lifecycle controller.
//!
//! The only component that mutates stored credentials. Orchestrates signup,
//! login, password recovery, and password update over the abstract store and
//! notifier; everything else in the subsystem is read-only with respect to
//! identities.

use regex::Regex;
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::AuthConfig;
use crate::error::Error;
use crate::identity::{Identity, IdentityUpdate, NewIdentity, Role};
use crate::notify::Notifier;
use crate::password::{hash_password, verify_password};
use crate::reset;
use crate::store::IdentityStore;
use crate::token::{now_unix, TokenSigner};

const MIN_PASSWORD_LEN: usize = 8;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

fn validate_new_password(password: &str, password_confirm: &str) -> Result<(), Error> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != password_confirm {
        return Err(Error::Validation("Passwords are not the same".to_string()));
    }
    Ok(())
}

/// Orchestrates the credential lifecycle against the host's store and
/// notifier.
pub struct AuthService {
    store: Arc<dyn IdentityStore>,
    notifier: Arc<dyn Notifier>,
    tokens: TokenSigner,
    config: AuthConfig,
}

impl AuthService {
    /// # Errors
    ///
    /// Fails when the configured signing secret is unusable; that is a
    /// startup fault, not an operational error.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        notifier: Arc<dyn Notifier>,
        config: AuthConfig,
    ) -> Result<Self, Error> {
        let tokens = TokenSigner::new(config.token_secret(), config.token_ttl_seconds())
            .map_err(|err| Error::Internal(anyhow::Error::new(err)))?;
        Ok(Self {
            store,
            notifier,
            tokens,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenSigner {
        &self.tokens
    }

    pub(crate) fn store(&self) -> &dyn IdentityStore {
        self.store.as_ref()
    }

    /// Register a new identity and log it in.
    ///
    /// The role is always `Standard`; callers cannot choose one. `origin` is
    /// the requesting scheme://host, used for the welcome link.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, `DuplicateEmail` when the address is
    /// taken, `NotificationDeliveryFailed` when the welcome message cannot be
    /// sent (the identity still exists at that point).
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
        password_confirm: &str,
        origin: &str,
    ) -> Result<(Identity, String), Error> {
        if name.trim().is_empty() {
            return Err(Error::Validation("Please tell us your name".to_string()));
        }
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(Error::Validation(
                "Please provide a valid email".to_string(),
            ));
        }
        validate_new_password(password, password_confirm)?;

        let digest = hash_password(password)?;
        let identity = self
            .store
            .create(NewIdentity {
                name: name.trim().to_string(),
                email,
                credential_digest: digest,
                role: Role::Standard,
            })
            .await?;
        debug!(id = %identity.id, "identity created");

        let url = format!("{origin}/me");
        if let Err(err) = self.notifier.send_welcome(&identity, &url).await {
            error!("welcome delivery failed: {err:#}");
            return Err(Error::NotificationDeliveryFailed);
        }

        let token = self.tokens.issue(identity.id)?;
        Ok((identity, token))
    }

    /// Authenticate by email and password.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for an unknown email and for a wrong password
    /// alike; the two cases are indistinguishable by design.
    pub async fn login(&self, email: &str, password: &str) -> Result<(Identity, String), Error> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(Error::Validation(
                "Please provide email and password".to_string(),
            ));
        }
        let email = normalize_email(email);
        let Some((identity, digest)) = self.store.find_by_email_with_credential(&email).await?
        else {
            return Err(Error::InvalidCredentials);
        };
        if !verify_password(password, &digest) {
            return Err(Error::InvalidCredentials);
        }
        let token = self.tokens.issue(identity.id)?;
        Ok((identity, token))
    }

    /// Begin password recovery for `email`.
    ///
    /// Writes the reset digest and expiry, then attempts delivery. If
    /// delivery fails the reset fields are cleared again before the error
    /// surfaces: a valid token whose plaintext nobody received must not stay
    /// behind.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown email (disclosed deliberately, no
    /// credential is involved), `NotificationDeliveryFailed` after rollback.
    pub async fn forgot_password(&self, email: &str, origin: &str) -> Result<(), Error> {
        let email = normalize_email(email);
        let Some(identity) = self.store.find_by_email(&email).await? else {
            return Err(Error::NotFound);
        };

        // Overwrites any prior outstanding token; at most one exists.
        let token = reset::generate();
        let expires_at = reset::expiry_from(now_unix());
        self.store
            .update(
                identity.id,
                IdentityUpdate::set_reset_token(token.digest, expires_at),
            )
            .await?
            .ok_or(Error::NotFound)?;

        let url = format!(
            "{origin}{route}/{token}",
            route = self.config.reset_route(),
            token = token.plaintext
        );
        self.send_reset_or_rollback(&identity, &url).await
    }

    /// Tentative state is already written; attempt the external effect and
    /// compensate on failure. Every exit path of this routine either
    /// delivered the plaintext or cleared the stored digest.
    async fn send_reset_or_rollback(&self, identity: &Identity, url: &str) -> Result<(), Error> {
        match self.notifier.send_password_reset(identity, url).await {
            Ok(()) => Ok(()),
            Err(send_err) => {
                error!("password reset delivery failed: {send_err:#}");
                if let Err(rollback_err) = self
                    .store
                    .update(identity.id, IdentityUpdate::clear_reset_token())
                    .await
                {
                    error!("failed to clear reset token after delivery failure: {rollback_err:#}");
                }
                Err(Error::NotificationDeliveryFailed)
            }
        }
    }

    /// Complete password recovery with a candidate token from the client.
    ///
    /// Single-use: success clears the stored digest, so presenting the same
    /// plaintext again fails. Wrong token and expired token are uniformly
    /// `InvalidOrExpiredResetToken`; no oracle.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed new password,
    /// `InvalidOrExpiredResetToken` otherwise.
    pub async fn reset_password(
        &self,
        candidate_token: &str,
        new_password: &str,
        new_password_confirm: &str,
    ) -> Result<(Identity, String), Error> {
        validate_new_password(new_password, new_password_confirm)?;

        let digest = reset::digest(candidate_token);
        let Some(identity) = self.store.find_by_reset_digest(&digest).await? else {
            return Err(Error::InvalidOrExpiredResetToken);
        };
        let expired = match identity.reset_token_expires_at {
            Some(expires_at) => now_unix() > expires_at,
            None => true,
        };
        if expired {
            return Err(Error::InvalidOrExpiredResetToken);
        }

        // Auto-login after reset; the watermark write also clears the token.
        self.rotate_credential(identity.id, new_password).await
    }

    /// Change the password of a guard-resolved identity.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` when the current password does not verify;
    /// `Validation` for a malformed new password.
    pub async fn update_password(
        &self,
        identity: &Identity,
        current_password: &str,
        new_password: &str,
        new_password_confirm: &str,
    ) -> Result<(Identity, String), Error> {
        validate_new_password(new_password, new_password_confirm)?;

        let Some(digest) = self.store.credential_digest(identity.id).await? else {
            return Err(Error::IdentityGone);
        };
        if !verify_password(current_password, &digest) {
            return Err(Error::InvalidCredentials);
        }
        self.rotate_credential(identity.id, new_password).await
    }

    /// Soft-delete: the identity disappears from default lookups but is
    /// never purged by this subsystem.
    ///
    /// # Errors
    ///
    /// `Internal` on store failure.
    pub async fn deactivate(&self, identity: &Identity) -> Result<(), Error> {
        self.store
            .update(
                identity.id,
                IdentityUpdate {
                    active: Some(false),
                    ..IdentityUpdate::default()
                },
            )
            .await?;
        Ok(())
    }

    /// The explicitly privileged role mutation path. Callers must have
    /// passed the administrator gate first.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn set_role(&self, id: uuid::Uuid, role: Role) -> Result<Identity, Error> {
        self.store
            .update(
                id,
                IdentityUpdate {
                    role: Some(role),
                    ..IdentityUpdate::default()
                },
            )
            .await?
            .ok_or(Error::NotFound)
    }

    /// Shared tail of every credential mutation: hash, write digest plus
    /// watermark atomically (clearing any reset token), issue a fresh
    /// session token.
    ///
    /// The watermark is set one second in the past so the token issued right
    /// here, in the same second, is not stale by its own check; any token
    /// issued before the mutation is.
    async fn rotate_credential(
        &self,
        id: uuid::Uuid,
        new_password: &str,
    ) -> Result<(Identity, String), Error> {
        let digest = hash_password(new_password)?;
        let changed_at = now_unix() - 1;
        let identity = self
            .store
            .update(id, IdentityUpdate::rotate_credential(digest, changed_at))
            .await?
            .ok_or(Error::IdentityGone)?;
        let token = self.tokens.issue(identity.id)?;
        Ok((identity, token))
    }
}
