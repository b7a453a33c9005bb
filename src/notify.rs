//! Outbound notification abstraction.
//!
//! Delivery itself (SMTP, API, queue) belongs to the host service; the
//! subsystem only needs the two messages the credential lifecycle sends and
//! a typed failure it can react to. Failures are never swallowed here: the
//! caller decides whether to compensate (forgot-password) or propagate
//! (signup).

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::identity::Identity;

/// Notification delivery abstraction consumed by the lifecycle controller.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Greet a freshly signed-up identity; `url` points at their profile.
    async fn send_welcome(&self, identity: &Identity, url: &str) -> Result<()>;

    /// Deliver a password-reset link. `url` embeds the plaintext reset
    /// token; it exists only for the duration of this call.
    async fn send_password_reset(&self, identity: &Identity, url: &str) -> Result<()>;
}

/// Local dev notifier that logs instead of sending anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_welcome(&self, identity: &Identity, url: &str) -> Result<()> {
        info!(email = %identity.email, url = %url, "welcome notification stub");
        Ok(())
    }

    async fn send_password_reset(&self, identity: &Identity, url: &str) -> Result<()> {
        // The url carries the reset secret; log only the recipient.
        info!(email = %identity.email, "password reset notification stub");
        Ok(())
    }
}
