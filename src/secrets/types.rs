//! Secret metadata, status, and access-audit types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecretType {
    Password,
    ApiKey,
    EncryptionKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationStrategy {
    Time,
    Usage,
    Manual,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretStatus {
    Active,
    PendingRotation,
    Rotating,
    Deprecated,
    Revoked,
    Expired,
}

impl SecretStatus {
    pub fn is_usable(self) -> bool {
        matches!(self, SecretStatus::Active)
    }
}

/// Metadata tracked for a secret. The value itself is stored separately
/// (see [`super::store::SecretStore`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretMetadata {
    pub secret_id: String,
    pub secret_type: SecretType,
    pub status: SecretStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_rotated: Option<DateTime<Utc>>,
    pub rotation_count: u32,
    pub usage_count: u64,
    pub max_usage: Option<u64>,
    pub strategy: RotationStrategy,
    pub tags: Vec<String>,
}

/// A single record of reading a secret's value, kept for audit and
/// anomaly analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    pub secret_id: String,
    pub actor: String,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub method: String,
    pub success: bool,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    ExcessiveAccess,
    FailedAttempts,
    UnusualTime,
    GeographicViolation,
    ConcurrentAccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub secret_id: String,
    pub kind: AnomalyKind,
    pub observed: f64,
    pub threshold: f64,
    pub risk_score: f64,
}

/// Normalizes `observed / threshold` into `[0, 1]`. A threshold of zero
/// is treated as already saturated (any nonzero observation is maximally
/// anomalous).
pub fn risk_score(observed: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return if observed > 0.0 { 1.0 } else { 0.0 };
    }
    (observed / threshold).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_score_clamps_to_unit_interval() {
        assert_eq!(risk_score(0.0, 10.0), 0.0);
        assert_eq!(risk_score(5.0, 10.0), 0.5);
        assert_eq!(risk_score(20.0, 10.0), 1.0);
    }

    #[test]
    fn risk_score_handles_zero_threshold() {
        assert_eq!(risk_score(0.0, 0.0), 0.0);
        assert_eq!(risk_score(1.0, 0.0), 1.0);
    }
}
