//! Postgres-backed identity store.
//!
//! Schema lives in `sql/schema.sql`. Every mutation is a single statement,
//! so the per-record atomicity the subsystem relies on comes straight from
//! Postgres row-level semantics.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::identity::{Identity, IdentityUpdate, NewIdentity, Role};
use crate::store::{IdentityStore, StoreError};
use crate::token::now_unix;

const IDENTITY_COLUMNS: &str =
    "id, name, email, role, active, credential_changed_at, reset_token_expires_at";

#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn identity_from_row(row: &PgRow) -> Result<Identity, StoreError> {
    let role: String = row.get("role");
    let role = Role::parse(&role)
        .ok_or_else(|| StoreError::Backend(anyhow!("unknown role in store: {role}")))?;
    Ok(Identity {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role,
        active: row.get("active"),
        credential_changed_at: row.get("credential_changed_at"),
        reset_token_expires_at: row.get("reset_token_expires_at"),
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn query_span(operation: &'static str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn create(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let query = "INSERT INTO identities (name, email, credential_digest, role, created_at_unix) \
                     VALUES ($1, $2, $3, $4, $5) \
                     RETURNING id, name, email, role, active, credential_changed_at, reset_token_expires_at";
        let span = query_span("INSERT", query);
        let row = sqlx::query(query)
            .bind(new.name)
            .bind(new.email)
            .bind(new.credential_digest)
            .bind(new.role.as_str())
            .bind(now_unix())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::DuplicateEmail
                } else {
                    StoreError::Backend(anyhow!(err).context("failed to create identity"))
                }
            })?;
        identity_from_row(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let query = &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1 AND active");
        let span = query_span("SELECT", query);
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up identity by id")
            .map_err(StoreError::Backend)?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let query =
            &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1 AND active");
        let span = query_span("SELECT", query);
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up identity by email")
            .map_err(StoreError::Backend)?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn find_by_email_with_credential(
        &self,
        email: &str,
    ) -> Result<Option<(Identity, String)>, StoreError> {
        // The one read allowed to project the credential digest.
        let query = &format!(
            "SELECT {IDENTITY_COLUMNS}, credential_digest FROM identities \
             WHERE email = $1 AND active"
        );
        let span = query_span("SELECT", query);
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up credential by email")
            .map_err(StoreError::Backend)?;
        row.as_ref()
            .map(|row| {
                let identity = identity_from_row(row)?;
                let digest: String = row.get("credential_digest");
                Ok((identity, digest))
            })
            .transpose()
    }

    async fn credential_digest(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        let query = "SELECT credential_digest FROM identities WHERE id = $1 AND active";
        let span = query_span("SELECT", query);
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to fetch credential digest")
            .map_err(StoreError::Backend)?;
        Ok(row.map(|row| row.get("credential_digest")))
    }

    async fn find_by_reset_digest(&self, digest: &str) -> Result<Option<Identity>, StoreError> {
        let query = &format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities \
             WHERE reset_token_digest = $1 AND active"
        );
        let span = query_span("SELECT", query);
        let row = sqlx::query(query)
            .bind(digest)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up identity by reset digest")
            .map_err(StoreError::Backend)?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn update(
        &self,
        id: Uuid,
        update: IdentityUpdate,
    ) -> Result<Option<Identity>, StoreError> {
        // One statement for the whole partial update. Paired fields share a
        // flag, so a digest can never land without its watermark or expiry.
        let query = &format!(
            "UPDATE identities SET \
               credential_digest      = CASE WHEN $2::bool THEN $3::text ELSE credential_digest END, \
               credential_changed_at  = CASE WHEN $2::bool THEN $4::bigint ELSE credential_changed_at END, \
               reset_token_digest     = CASE WHEN $5::bool THEN $6::text ELSE reset_token_digest END, \
               reset_token_expires_at = CASE WHEN $5::bool THEN $7::bigint ELSE reset_token_expires_at END, \
               active                 = CASE WHEN $8::bool THEN $9::bool ELSE active END, \
               role                   = CASE WHEN $10::bool THEN $11::text ELSE role END \
             WHERE id = $1 \
             RETURNING {IDENTITY_COLUMNS}"
        );
        let (set_credential, digest, changed_at) = match update.credential {
            Some((digest, changed_at)) => (true, Some(digest), Some(changed_at)),
            None => (false, None, None),
        };
        let (set_reset, reset_digest, reset_expires) = match update.reset_token {
            Some(Some((digest, expires_at))) => (true, Some(digest), Some(expires_at)),
            Some(None) => (true, None, None),
            None => (false, None, None),
        };
        let span = query_span("UPDATE", query);
        let row = sqlx::query(query)
            .bind(id)
            .bind(set_credential)
            .bind(digest)
            .bind(changed_at)
            .bind(set_reset)
            .bind(reset_digest)
            .bind(reset_expires)
            .bind(update.active.is_some())
            .bind(update.active)
            .bind(update.role.is_some())
            .bind(update.role.map(Role::as_str))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to update identity")
            .map_err(StoreError::Backend)?;
        row.as_ref().map(identity_from_row).transpose()
    }
}
