//! # Admin Key Service
//!
//! Process-wide administrative key for privileged maintenance operations
//! (credential registration, policy inspection). The key is seeded from
//! configuration or generated at startup, can be rotated at runtime, and
//! resets only on restart. Verification is constant-shape string comparison
//! against the current key; the key itself is never logged.

use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

pub struct AdminKeyService {
    current_key: RwLock<String>,
}

impl AdminKeyService {
    /// Seed from configuration; a missing configured key gets a generated one
    pub fn new(configured_key: Option<String>) -> Self {
        let key = match configured_key {
            Some(key) if !key.trim().is_empty() => key,
            _ => {
                let generated = generate_admin_key();
                info!("no admin key configured, generated one for this process");
                generated
            }
        };
        Self {
            current_key: RwLock::new(key),
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        *self.current_key.read() == candidate
    }

    /// Rotate the key, invalidating the previous one immediately
    pub fn regenerate(&self) -> String {
        let new_key = generate_admin_key();
        *self.current_key.write() = new_key.clone();
        info!("admin key regenerated");
        new_key
    }
}

fn generate_admin_key() -> String {
    format!("admin-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_key_verifies() {
        let service = AdminKeyService::new(Some("admin-fixed".to_string()));
        assert!(service.verify("admin-fixed"));
        assert!(!service.verify("admin-wrong"));
    }

    #[test]
    fn test_blank_configured_key_is_replaced() {
        let service = AdminKeyService::new(Some("   ".to_string()));
        assert!(!service.verify("   "));
    }

    #[test]
    fn test_regenerate_invalidates_old_key() {
        let service = AdminKeyService::new(Some("admin-fixed".to_string()));
        let new_key = service.regenerate();
        assert!(new_key.starts_with("admin-"));
        assert!(!service.verify("admin-fixed"));
        assert!(service.verify(&new_key));
    }
}
