//! In-memory identity store for tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::identity::{Identity, IdentityUpdate, NewIdentity, Role};
use crate::store::{IdentityStore, StoreError};

/// Full per-identity state, digests included. Lives only behind the lock;
/// reads project it down to [`Identity`].
#[derive(Debug, Clone)]
struct StoredIdentity {
    id: Uuid,
    name: String,
    email: String,
    credential_digest: String,
    role: Role,
    active: bool,
    credential_changed_at: Option<i64>,
    reset_token_digest: Option<String>,
    reset_token_expires_at: Option<i64>,
}

impl StoredIdentity {
    fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            active: self.active,
            credential_changed_at: self.credential_changed_at,
            reset_token_expires_at: self.reset_token_expires_at,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    records: RwLock<HashMap<Uuid, StoredIdentity>>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn create(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let mut records = self.records.write().await;
        if records.values().any(|record| record.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let record = StoredIdentity {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            credential_digest: new.credential_digest,
            role: new.role,
            active: true,
            credential_changed_at: None,
            reset_token_digest: None,
            reset_token_expires_at: None,
        };
        let identity = record.identity();
        records.insert(record.id, record);
        Ok(identity)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .get(&id)
            .filter(|record| record.active)
            .map(StoredIdentity::identity))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|record| record.active && record.email == email)
            .map(StoredIdentity::identity))
    }

    async fn find_by_email_with_credential(
        &self,
        email: &str,
    ) -> Result<Option<(Identity, String)>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|record| record.active && record.email == email)
            .map(|record| (record.identity(), record.credential_digest.clone())))
    }

    async fn credential_digest(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .get(&id)
            .filter(|record| record.active)
            .map(|record| record.credential_digest.clone()))
    }

    async fn find_by_reset_digest(&self, digest: &str) -> Result<Option<Identity>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|record| {
                record.active && record.reset_token_digest.as_deref() == Some(digest)
            })
            .map(StoredIdentity::identity))
    }

    async fn update(
        &self,
        id: Uuid,
        update: IdentityUpdate,
    ) -> Result<Option<Identity>, StoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&id) else {
            return Ok(None);
        };
        if let Some((digest, changed_at)) = update.credential {
            record.credential_digest = digest;
            record.credential_changed_at = Some(changed_at);
        }
        if let Some(reset_token) = update.reset_token {
            match reset_token {
                Some((digest, expires_at)) => {
                    record.reset_token_digest = Some(digest);
                    record.reset_token_expires_at = Some(expires_at);
                }
                None => {
                    record.reset_token_digest = None;
                    record.reset_token_expires_at = None;
                }
            }
        }
        if let Some(active) = update.active {
            record.active = active;
        }
        if let Some(role) = update.role {
            record.role = role;
        }
        Ok(Some(record.identity()))
    }
}
