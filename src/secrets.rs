//! # Secret Codec
//!
//! Contract for encrypting credentials at rest and decrypting them inside
//! the dispatcher's unit of work. Plaintext never reaches a log line.
//!
//! [`Base64SecretCodec`] is the development/test implementation: a
//! reversible encoding, not encryption. Deployments wire a real
//! implementation (KMS, vault, libsodium) behind the same trait.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("secret cannot be empty")]
    Empty,

    #[error("failed to decode secret: {0}")]
    Decode(String),
}

pub trait SecretCodec: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, SecretError>;

    fn decrypt(&self, encrypted: &str) -> Result<String, SecretError>;
}

/// Development codec: base64 with a fixed prefix so stored values are
/// recognizable as encoded rather than raw.
#[derive(Debug, Clone, Default)]
pub struct Base64SecretCodec;

const ENCODED_PREFIX: &str = "b64:";

impl Base64SecretCodec {
    pub fn new() -> Self {
        Self
    }
}

impl SecretCodec for Base64SecretCodec {
    fn encrypt(&self, plaintext: &str) -> Result<String, SecretError> {
        if plaintext.is_empty() {
            return Err(SecretError::Empty);
        }
        Ok(format!("{ENCODED_PREFIX}{}", BASE64.encode(plaintext)))
    }

    fn decrypt(&self, encrypted: &str) -> Result<String, SecretError> {
        if encrypted.is_empty() {
            return Err(SecretError::Empty);
        }
        let payload = encrypted
            .strip_prefix(ENCODED_PREFIX)
            .ok_or_else(|| SecretError::Decode("missing encoding prefix".to_string()))?;
        let bytes = BASE64
            .decode(payload)
            .map_err(|e| SecretError::Decode(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| SecretError::Decode(e.to_string()))
    }
}
