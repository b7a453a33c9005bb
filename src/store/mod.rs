//! Abstract identity repository.
//!
//! The subsystem owns no persistence of its own; it talks to whatever the
//! host service provides through [`IdentityStore`]. Default lookups exclude
//! inactive identities and never return credential material; the digest is
//! only reachable through the lookups that explicitly request it.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::identity::{Identity, IdentityUpdate, NewIdentity};

pub mod memory;
pub mod postgres;

pub use memory::MemoryIdentityStore;
pub use postgres::PgIdentityStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-email constraint violated on create.
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Repository operations the subsystem consumes.
///
/// The single [`update`](IdentityStore::update) entry point applies an
/// [`IdentityUpdate`] atomically per record: a credential digest and its
/// watermark, or a reset digest and its expiry, are never visible
/// half-written to a concurrent reader.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Persist a new identity.
    ///
    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken.
    async fn create(&self, new: NewIdentity) -> Result<Identity, StoreError>;

    /// Look up an active identity by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    /// Look up an active identity by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    /// Email lookup that also surfaces the credential digest (login path).
    async fn find_by_email_with_credential(
        &self,
        email: &str,
    ) -> Result<Option<(Identity, String)>, StoreError>;

    /// Explicitly fetch the credential digest of an active identity.
    async fn credential_digest(&self, id: Uuid) -> Result<Option<String>, StoreError>;

    /// Exact-match lookup by stored reset-token digest.
    async fn find_by_reset_digest(&self, digest: &str) -> Result<Option<Identity>, StoreError>;

    /// Apply a partial update atomically; `None` when the id is unknown.
    async fn update(
        &self,
        id: Uuid,
        update: IdentityUpdate,
    ) -> Result<Option<Identity>, StoreError>;
}
