//! # Credential Lookup
//!
//! External collaborator contract for host credential records. The core
//! distinguishes "no credential for this host" from "credential exists but
//! the host is deactivated"; both end the submission without a connection
//! attempt.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::HostCredential;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_host(&self, host: &str) -> Option<HostCredential>;

    async fn save(&self, credential: HostCredential) -> HostCredential;

    /// Stamp a successful connection on the host's credential
    async fn touch_connected(&self, host: &str);
}

/// Map-backed credential store keyed by host
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    records: RwLock<HashMap<String, HostCredential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_host(&self, host: &str) -> Option<HostCredential> {
        self.records.read().await.get(host).cloned()
    }

    async fn save(&self, credential: HostCredential) -> HostCredential {
        self.records
            .write()
            .await
            .insert(credential.host.clone(), credential.clone());
        credential
    }

    async fn touch_connected(&self, host: &str) {
        if let Some(credential) = self.records.write().await.get_mut(host) {
            credential.touch_connected();
        }
    }
}
