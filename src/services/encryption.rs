// src/services/encryption.rs
//! AES-256-GCM sealing for provider tokens and user API keys at rest

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use std::env;
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("Encryption key not configured")]
    KeyNotConfigured,

    #[error("Invalid encryption key format")]
    InvalidKeyFormat,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid encrypted data format")]
    InvalidDataFormat,

    #[error("Value is encrypted but no key is configured")]
    KeyRequired,
}

pub struct EncryptionService {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService")
            .field("cipher", &"<encrypted>")
            .finish()
    }
}

impl EncryptionService {
    /// Initialize from the ENCRYPTION_MASTER_KEY environment variable
    pub fn from_env() -> Result<Self, EncryptionError> {
        let key_str =
            env::var("ENCRYPTION_MASTER_KEY").map_err(|_| EncryptionError::KeyNotConfigured)?;

        Self::from_key(key_str.trim())
    }

    /// Initialize from a base64-encoded 32 byte key
    pub fn from_key(key_str: &str) -> Result<Self, EncryptionError> {
        let key_bytes = BASE64
            .decode(key_str.as_bytes())
            .map_err(|_| EncryptionError::InvalidKeyFormat)?;

        if key_bytes.len() != 32 {
            return Err(EncryptionError::InvalidKeyFormat);
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|_| EncryptionError::InvalidKeyFormat)?;

        Ok(Self { cipher })
    }

    /// Generate a new random encryption key (base64-encoded)
    pub fn generate_key() -> String {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        BASE64.encode(key)
    }

    /// Encrypt and return base64(nonce || ciphertext)
    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(combined))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String, EncryptionError> {
        let combined = BASE64
            .decode(encrypted.as_bytes())
            .map_err(|_| EncryptionError::InvalidDataFormat)?;

        if combined.len() < NONCE_LEN {
            return Err(EncryptionError::InvalidDataFormat);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext_bytes = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| EncryptionError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext_bytes)
            .map_err(|_| EncryptionError::DecryptionFailed("invalid UTF-8".to_string()))
    }
}

/// Seals a token when a key is available, otherwise stores it as-is.
/// Returns the stored value and whether it was encrypted.
pub fn seal_token(
    encryption: Option<&EncryptionService>,
    token: &str,
) -> Result<(String, bool), EncryptionError> {
    match encryption {
        Some(service) => Ok((service.encrypt(token)?, true)),
        None => Ok((token.to_string(), false)),
    }
}

/// Reverses [`seal_token`] using the row's encrypted flag
pub fn open_token(
    encryption: Option<&EncryptionService>,
    stored: &str,
    encrypted: bool,
) -> Result<String, EncryptionError> {
    if !encrypted {
        return Ok(stored.to_string());
    }
    encryption
        .ok_or(EncryptionError::KeyRequired)?
        .decrypt(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key() {
        let key = EncryptionService::generate_key();
        assert!(EncryptionService::from_key(&key).is_ok());
    }

    #[test]
    fn test_encrypt_decrypt() {
        let service = EncryptionService::from_key(&EncryptionService::generate_key()).unwrap();

        let plaintext = "secret_notion_token_12345";
        let encrypted = service.encrypt(plaintext).unwrap();
        assert_ne!(encrypted, plaintext);
        assert_eq!(service.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn test_encrypt_produces_different_ciphertext() {
        let service = EncryptionService::from_key(&EncryptionService::generate_key()).unwrap();

        let encrypted1 = service.encrypt("test_data").unwrap();
        let encrypted2 = service.encrypt("test_data").unwrap();
        assert_ne!(encrypted1, encrypted2);
    }

    #[test]
    fn test_invalid_key_format() {
        assert!(EncryptionService::from_key("invalid_key").is_err());
        // valid base64 but only 16 bytes
        assert!(EncryptionService::from_key("AAAAAAAAAAAAAAAAAAAAAA==").is_err());
    }

    #[test]
    fn test_decrypt_with_other_key_fails() {
        let a = EncryptionService::from_key(&EncryptionService::generate_key()).unwrap();
        let b = EncryptionService::from_key(&EncryptionService::generate_key()).unwrap();
        let sealed = a.encrypt("token").unwrap();
        assert!(b.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_seal_without_key_is_passthrough() {
        let (stored, encrypted) = seal_token(None, "plain").unwrap();
        assert_eq!(stored, "plain");
        assert!(!encrypted);
        assert_eq!(open_token(None, &stored, encrypted).unwrap(), "plain");
    }

    #[test]
    fn test_open_sealed_value_requires_key() {
        let service = EncryptionService::from_key(&EncryptionService::generate_key()).unwrap();
        let (stored, encrypted) = seal_token(Some(&service), "tok").unwrap();
        assert!(encrypted);
        assert!(matches!(
            open_token(None, &stored, encrypted),
            Err(EncryptionError::KeyRequired)
        ));
        assert_eq!(open_token(Some(&service), &stored, encrypted).unwrap(), "tok");
    }
}
