//! At-rest encryption for TOTP secrets using a deployment-managed
//! symmetric key. The key itself is never logged and never persisted by
//! this module; it is handed in by the caller (typically sourced from
//! the deployment's secret manager at startup).

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A TOTP secret encrypted at rest. The nonce is generated fresh per
/// encryption and stored alongside the ciphertext; AES-GCM nonces must
/// never repeat under the same key, and a fresh nonce per call gives us
/// that without coordination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub nonce_b64: String,
    pub ciphertext_b64: String,
}

/// Wraps a 256-bit deployment key. Construction is the only place the
/// raw key bytes are handled; callers should not expose it further.
#[derive(Clone)]
pub struct SecretCipher {
    key: Key<Aes256Gcm>,
}

impl SecretCipher {
    /// `key` must be exactly 32 bytes (AES-256).
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        if key.len() != 32 {
            return Err(Error::Internal(format!(
                "MFA secret encryption key must be 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(Self {
            key: *Key::<Aes256Gcm>::from_slice(key),
        })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedSecret, Error> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::Internal(format!("MFA secret encryption failed: {e}")))?;
        Ok(EncryptedSecret {
            nonce_b64: base64::engine::general_purpose::STANDARD.encode(nonce),
            ciphertext_b64: base64::engine::general_purpose::STANDARD.encode(ciphertext),
        })
    }

    pub fn decrypt(&self, encrypted: &EncryptedSecret) -> Result<Vec<u8>, Error> {
        let nonce_bytes = base64::engine::general_purpose::STANDARD
            .decode(&encrypted.nonce_b64)
            .map_err(|e| Error::Internal(format!("invalid MFA secret nonce encoding: {e}")))?;
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(&encrypted.ciphertext_b64)
            .map_err(|e| Error::Internal(format!("invalid MFA secret ciphertext encoding: {e}")))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let cipher = Aes256Gcm::new(&self.key);
        cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|_| Error::Auth("MFA secret decryption failed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_secret() {
        let cipher = SecretCipher::new(&[7u8; 32]).unwrap();
        let secret = crate::mfa::totp::generate_secret();

        let encrypted = cipher.encrypt(&secret).unwrap();
        let decrypted = cipher.decrypt(&encrypted).unwrap();

        assert_eq!(decrypted, secret);
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(SecretCipher::new(&[1u8; 16]).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let cipher = SecretCipher::new(&[3u8; 32]).unwrap();
        let mut encrypted = cipher.encrypt(b"a totp secret").unwrap();
        encrypted.ciphertext_b64 = cipher.encrypt(b"different bytes!!").unwrap().ciphertext_b64;

        assert!(cipher.decrypt(&encrypted).is_err());
    }

    #[test]
    fn different_keys_produce_unusable_ciphertext() {
        let cipher_a = SecretCipher::new(&[1u8; 32]).unwrap();
        let cipher_b = SecretCipher::new(&[2u8; 32]).unwrap();
        let encrypted = cipher_a.encrypt(b"shared secret").unwrap();

        assert!(cipher_b.decrypt(&encrypted).is_err());
    }
}
