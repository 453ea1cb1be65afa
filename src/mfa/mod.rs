//! MFA enrollment, TOTP/recovery-code verification, and session gating.
//!
//! TOTP secrets are generated per RFC 6238 and encrypted at rest with a
//! deployment-managed AES-256-GCM key; recovery codes are single-use and
//! stored only as salted hashes. Session verification state lives in the
//! shared distributed cache so gating works the same way across replicas.

pub mod recovery;
pub mod secret_store;
pub mod service;
pub mod session;
pub mod totp;

pub use recovery::HashedRecoveryCode;
pub use secret_store::{EncryptedSecret, SecretCipher};
pub use service::{MfaEnrollment, MfaService, PendingEnrollment};
pub use session::{MfaPolicy, SessionGate};
