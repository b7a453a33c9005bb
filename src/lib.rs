//! # Gardi (Credential Lifecycle & Access Control)
//!
//! `gardi` is the authentication and authorization subsystem of the resource
//! service. It turns plaintext passwords into durable Argon2id digests,
//! issues and verifies signed session tokens, guards requests, enforces
//! role-based access, and runs self-service password recovery.
//!
//! ## Sessions
//!
//! Sessions are stateless HS256 JWTs carrying only the subject id and issue
//! time. There is no server-side session record and no revocation list;
//! logout merely overwrites the client cookie. What bounds a stolen token is
//! its TTL and the credential watermark: every password change stamps
//! `credential_changed_at`, and the session guard rejects any token issued
//! at or before that instant (`StaleSession`).
//!
//! ## Password recovery
//!
//! Recovery tokens are single-use and ten-minute-bounded. Only the SHA-256
//! digest of the token is stored; the plaintext rides once in the reset URL
//! and is gone. Wrong and expired tokens are deliberately
//! indistinguishable to the caller.
//!
//! ## Integration
//!
//! The host service supplies an [`store::IdentityStore`] (Postgres and
//! in-memory implementations ship here) and a [`notify::Notifier`], builds
//! an [`service::AuthService`], and mounts [`handlers::router`]. Business
//! handlers outside this crate call [`session::authenticate`] and
//! [`authz::require_role`] at their own seams.

pub mod authz;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod notify;
pub mod password;
pub mod reset;
pub mod service;
pub mod session;
pub mod store;
pub mod token;

pub use config::AuthConfig;
pub use error::Error;
pub use identity::{Identity, PublicIdentity, Role};
pub use service::AuthService;
