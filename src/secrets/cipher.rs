//! At-rest encryption for secret values using a deployment-managed
//! symmetric key, handed in by the caller at startup.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A secret value encrypted at rest. The nonce is generated fresh per
/// encryption; AES-GCM nonces must never repeat under the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedValue {
    pub nonce_b64: String,
    pub ciphertext_b64: String,
}

#[derive(Clone)]
pub struct ValueCipher {
    key: Key<Aes256Gcm>,
}

impl ValueCipher {
    /// `key` must be exactly 32 bytes (AES-256).
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        if key.len() != 32 {
            return Err(Error::Internal(format!("secret encryption key must be 32 bytes, got {}", key.len())));
        }
        Ok(Self { key: *Key::<Aes256Gcm>::from_slice(key) })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedValue, Error> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::Internal(format!("secret encryption failed: {e}")))?;
        Ok(EncryptedValue {
            nonce_b64: base64::engine::general_purpose::STANDARD.encode(nonce),
            ciphertext_b64: base64::engine::general_purpose::STANDARD.encode(ciphertext),
        })
    }

    pub fn decrypt(&self, encrypted: &EncryptedValue) -> Result<Vec<u8>, Error> {
        let nonce_bytes = base64::engine::general_purpose::STANDARD
            .decode(&encrypted.nonce_b64)
            .map_err(|e| Error::Internal(format!("invalid secret nonce encoding: {e}")))?;
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(&encrypted.ciphertext_b64)
            .map_err(|e| Error::Internal(format!("invalid secret ciphertext encoding: {e}")))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let cipher = Aes256Gcm::new(&self.key);
        cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|_| Error::Auth("secret decryption failed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let cipher = ValueCipher::new(&[7u8; 32]).unwrap();
        let encrypted = cipher.encrypt(b"a-high-entropy-api-key").unwrap();
        let decrypted = cipher.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, b"a-high-entropy-api-key");
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(ValueCipher::new(&[1u8; 16]).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let cipher = ValueCipher::new(&[3u8; 32]).unwrap();
        let mut encrypted = cipher.encrypt(b"original value").unwrap();
        encrypted.ciphertext_b64 = cipher.encrypt(b"different bytes!!").unwrap().ciphertext_b64;
        assert!(cipher.decrypt(&encrypted).is_err());
    }
}
