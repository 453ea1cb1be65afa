//! Secret lifecycle management: create/rotate/access with encryption at
//! rest, emergency fan-out rotation, and access-pattern anomaly
//! detection.

pub mod anomaly;
pub mod cipher;
pub mod generate;
pub mod rotation;
#[cfg(feature = "audit")]
pub mod service;
pub mod store;
pub mod types;

pub use anomaly::{above_alert_threshold, classify};
pub use cipher::{EncryptedValue, ValueCipher};
pub use rotation::{emergency_rotate_all, RotationOutcome};
#[cfg(feature = "audit")]
pub use service::SecretService;
pub use store::{AccessContext, SecretStore};
pub use types::{
    AccessEvent, Anomaly, AnomalyKind, RotationStrategy, SecretMetadata, SecretStatus, SecretType,
};
