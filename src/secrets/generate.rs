//! Value generation for each secret type. Values are never persisted in
//! plaintext by this module; callers hand the returned bytes/string to
//! the store immediately.

use base64::Engine as _;
use rand::RngCore;

use crate::secrets::types::SecretType;

const PASSWORD_BYTES: usize = 24;
const API_KEY_BYTES: usize = 32;
const ENCRYPTION_KEY_BYTES: usize = 32;

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    buf
}

/// Generates a value of the shape appropriate to `secret_type`:
/// a high-entropy URL-safe string for passwords and API keys, and raw
/// symmetric key material (base64-encoded for storage) for encryption
/// keys.
pub fn generate_value(secret_type: SecretType) -> String {
    let len = match secret_type {
        SecretType::Password => PASSWORD_BYTES,
        SecretType::ApiKey => API_KEY_BYTES,
        SecretType::EncryptionKey => ENCRYPTION_KEY_BYTES,
    };
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_values_are_url_safe_and_nonempty() {
        for secret_type in [SecretType::Password, SecretType::ApiKey, SecretType::EncryptionKey] {
            let value = generate_value(secret_type);
            assert!(!value.is_empty());
            assert!(value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn successive_generations_differ() {
        assert_ne!(generate_value(SecretType::ApiKey), generate_value(SecretType::ApiKey));
    }
}
