//! # Host Credential
//!
//! SSH access material for one target host. The secret is stored encrypted
//! (see [`crate::secrets::SecretCodec`]) and only decrypted inside the
//! dispatcher's unit of work, immediately before a session is opened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::DEFAULT_SSH_PORT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCredential {
    pub id: Option<i64>,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Encrypted secret material; never logged or exposed in cleartext
    pub encrypted_secret: String,
    /// Client identification key, `client-` + UUIDv4
    pub api_key: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl HostCredential {
    /// Register a new host credential; active by default, port defaults to 22
    pub fn create(
        host: impl Into<String>,
        port: Option<u16>,
        username: impl Into<String>,
        encrypted_secret: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            id: None,
            host: host.into(),
            port: port.unwrap_or(DEFAULT_SSH_PORT),
            username: username.into(),
            encrypted_secret: encrypted_secret.into(),
            api_key: generate_api_key(),
            description,
            active: true,
            created_at: Utc::now(),
            updated_at: None,
            last_connected_at: None,
        }
    }

    /// Replace the stored secret with new encrypted material
    pub fn update_secret(&mut self, new_encrypted_secret: impl Into<String>) {
        self.encrypted_secret = new_encrypted_secret.into();
        self.touch_updated();
    }

    /// Update connection details; `None` fields are left unchanged
    pub fn update_info(
        &mut self,
        host: Option<String>,
        port: Option<u16>,
        username: Option<String>,
        description: Option<String>,
    ) {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(username) = username {
            self.username = username;
        }
        if let Some(description) = description {
            self.description = Some(description);
        }
        self.touch_updated();
    }

    /// Issue a fresh API key, invalidating the previous one
    pub fn regenerate_api_key(&mut self) -> String {
        self.api_key = generate_api_key();
        self.touch_updated();
        self.api_key.clone()
    }

    pub fn activate(&mut self) {
        self.active = true;
        self.touch_updated();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.touch_updated();
    }

    /// Stamp a successful connection
    pub fn touch_connected(&mut self) {
        self.last_connected_at = Some(Utc::now());
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn touch_updated(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

fn generate_api_key() -> String {
    format!("client-{}", Uuid::new_v4())
}
