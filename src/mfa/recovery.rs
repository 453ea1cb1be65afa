//! One-time recovery codes: generated in a batch, returned to the caller
//! in plaintext exactly once, and stored thereafter only as salted
//! hashes. Each code can be consumed exactly once.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const DEFAULT_CODE_COUNT: usize = 10;
const CODE_BYTES: usize = 5;
const SALT_BYTES: usize = 16;

/// A single stored recovery code. Never carries the plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashedRecoveryCode {
    salt_hex: String,
    hash_hex: String,
    pub used: bool,
}

fn hash_code(salt: &[u8], code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
            .collect()
    }
}

/// Formats raw random bytes as a human-typable grouped code, e.g.
/// `7F3A9-C21B0`.
fn format_code(bytes: &[u8]) -> String {
    let raw: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
    let mid = raw.len() / 2;
    format!("{}-{}", &raw[..mid], &raw[mid..])
}

/// Generates `count` (default [`DEFAULT_CODE_COUNT`]) fresh recovery
/// codes. Returns the plaintext codes (to surface to the caller exactly
/// once) paired with their stored, hashed form.
pub fn generate(count: Option<usize>) -> (Vec<String>, Vec<HashedRecoveryCode>) {
    let count = count.unwrap_or(DEFAULT_CODE_COUNT);
    let mut plaintext = Vec::with_capacity(count);
    let mut stored = Vec::with_capacity(count);

    for _ in 0..count {
        let mut code_bytes = [0u8; CODE_BYTES];
        rand::rng().fill_bytes(&mut code_bytes);
        let code = format_code(&code_bytes);

        let mut salt = [0u8; SALT_BYTES];
        rand::rng().fill_bytes(&mut salt);
        let hash_hex = hash_code(&salt, &code);

        stored.push(HashedRecoveryCode {
            salt_hex: hex::encode(salt),
            hash_hex,
            used: false,
        });
        plaintext.push(code);
    }

    (plaintext, stored)
}

/// Attempts to consume `candidate` against the stored set. On success,
/// marks the matching entry `used` and returns `true`. Used codes never
/// match again. Returns the remaining unused count alongside the
/// outcome so callers can prompt regeneration when it runs low.
pub fn verify_and_consume(codes: &mut [HashedRecoveryCode], candidate: &str) -> (bool, usize) {
    let mut matched = false;
    for entry in codes.iter_mut() {
        if entry.used {
            continue;
        }
        let Some(salt) = hex::decode(&entry.salt_hex) else {
            continue;
        };
        if hash_code(&salt, candidate) == entry.hash_hex {
            entry.used = true;
            matched = true;
            break;
        }
    }
    let remaining = codes.iter().filter(|c| !c.used).count();
    (matched, remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_batch_has_ten_codes() {
        let (plaintext, stored) = generate(None);
        assert_eq!(plaintext.len(), 10);
        assert_eq!(stored.len(), 10);
    }

    #[test]
    fn a_code_verifies_exactly_once() {
        let (plaintext, mut stored) = generate(Some(3));
        let candidate = plaintext[0].clone();

        let (first, remaining_after_first) = verify_and_consume(&mut stored, &candidate);
        assert!(first);
        assert_eq!(remaining_after_first, 2);

        let (second, remaining_after_second) = verify_and_consume(&mut stored, &candidate);
        assert!(!second);
        assert_eq!(remaining_after_second, 2);
    }

    #[test]
    fn unknown_code_does_not_match() {
        let (_plaintext, mut stored) = generate(Some(3));
        let (matched, remaining) = verify_and_consume(&mut stored, "00000-00000");
        assert!(!matched);
        assert_eq!(remaining, 3);
    }

    #[test]
    fn codes_are_not_stored_in_plaintext() {
        let (plaintext, stored) = generate(Some(1));
        assert!(!stored[0].hash_hex.contains(&plaintext[0]));
    }
}
