//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use gardi::config::AuthConfig;
use gardi::identity::Identity;
use gardi::notify::Notifier;
use gardi::service::AuthService;
use gardi::store::MemoryIdentityStore;

pub const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Welcome,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub kind: MessageKind,
    pub email: String,
    pub url: String,
}

/// Notifier double: records deliveries, fails on demand.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    fail_next: AtomicBool,
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next delivery attempt fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    fn record(&self, kind: MessageKind, identity: &Identity, url: &str) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("simulated delivery failure"));
        }
        self.sent.lock().expect("notifier mutex poisoned").push(SentMessage {
            kind,
            email: identity.email.clone(),
            url: url.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_welcome(&self, identity: &Identity, url: &str) -> Result<()> {
        self.record(MessageKind::Welcome, identity, url)
    }

    async fn send_password_reset(&self, identity: &Identity, url: &str) -> Result<()> {
        self.record(MessageKind::PasswordReset, identity, url)
    }
}

pub struct Harness {
    pub service: Arc<AuthService>,
    pub store: Arc<MemoryIdentityStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness() -> Result<Harness> {
    let store = Arc::new(MemoryIdentityStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let config = AuthConfig::new(SecretString::from(TEST_SECRET));
    let service = Arc::new(AuthService::new(store.clone(), notifier.clone(), config)?);
    Ok(Harness {
        service,
        store,
        notifier,
    })
}
