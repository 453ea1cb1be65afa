//! Session-level MFA gating. Verification state lives in the shared
//! distributed cache keyed by session id; absence of an entry is always
//! treated as "not verified" so a cache eviction fails closed rather
//! than open.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::distributed::{DistributedCache, Tier};
use crate::error::Error;

const CACHE_NAMESPACE: &str = "mfa-session";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VerificationRecord {
    verified_at: DateTime<Utc>,
}

/// Tracks which sessions have recently completed MFA verification, and
/// answers the three policy questions endpoints depend on:
/// whether MFA is enabled for a tenant, whether a session was verified
/// within a policy window, and recording a fresh verification.
pub struct SessionGate {
    cache: Arc<DistributedCache<VerificationRecord>>,
}

impl SessionGate {
    pub fn new(cache: Arc<DistributedCache<VerificationRecord>>) -> Self {
        Self { cache }
    }

    fn key(session_id: &str) -> String {
        format!("{CACHE_NAMESPACE}:{session_id}")
    }

    /// Records that `session_id` completed MFA verification now. The
    /// entry expires after `ttl`, after which the session reverts to
    /// "not verified" until it re-verifies.
    pub async fn record_verified(&self, session_id: &str, ttl: Duration) -> Result<(), Error> {
        self.cache
            .set(
                &Self::key(session_id),
                VerificationRecord { verified_at: Utc::now() },
                Some(ttl),
                vec![],
                Tier::Both,
            )
            .await
    }

    /// True if `session_id` verified within the last `window`. Absence
    /// of a cache entry (never verified, or the record expired) is
    /// always "not verified".
    pub async fn verified_within(&self, session_id: &str, window: Duration) -> bool {
        let Some(record) = self.cache.get(&Self::key(session_id)).await else {
            return false;
        };
        let age = Utc::now().signed_duration_since(record.verified_at);
        age.to_std().map(|age| age <= window).unwrap_or(false)
    }

    /// Clears a session's verification record, e.g. on MFA disable or
    /// explicit step-down.
    pub async fn clear(&self, session_id: &str) -> Result<(), Error> {
        self.cache.invalidate_key(&Self::key(session_id)).await
    }
}

/// Tenant-level policy controlling whether and how strictly MFA gating
/// applies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MfaPolicy {
    pub enabled: bool,
    pub reverify_window: Duration,
}

impl MfaPolicy {
    pub fn disabled() -> Self {
        Self { enabled: false, reverify_window: Duration::from_secs(0) }
    }
}

/// `true` if `policy` requires MFA and the session hasn't verified
/// within the policy's reverify window. Disabled policies never gate.
pub async fn requires_verification(gate: &SessionGate, session_id: &str, policy: &MfaPolicy) -> bool {
    if !policy.enabled {
        return false;
    }
    !gate.verified_within(session_id, policy.reverify_window).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn gate() -> SessionGate {
        let cache = DistributedCache::<VerificationRecord>::new("mfa-session-test", &CacheConfig::default(), None)
            .unwrap();
        SessionGate::new(Arc::new(cache))
    }

    #[tokio::test]
    async fn absence_is_not_verified() {
        let gate = gate();
        assert!(!gate.verified_within("sess-1", Duration::from_secs(300)).await);
    }

    #[tokio::test]
    async fn recorded_verification_is_seen_within_window() {
        let gate = gate();
        gate.record_verified("sess-2", Duration::from_secs(300)).await.unwrap();
        assert!(gate.verified_within("sess-2", Duration::from_secs(300)).await);
    }

    #[tokio::test]
    async fn disabled_policy_never_requires_verification() {
        let gate = gate();
        let policy = MfaPolicy::disabled();
        assert!(!requires_verification(&gate, "sess-3", &policy).await);
    }

    #[tokio::test]
    async fn enabled_policy_requires_verification_when_absent() {
        let gate = gate();
        let policy = MfaPolicy { enabled: true, reverify_window: Duration::from_secs(300) };
        assert!(requires_verification(&gate, "sess-4", &policy).await);
    }

    #[tokio::test]
    async fn clearing_a_session_reverts_to_unverified() {
        let gate = gate();
        gate.record_verified("sess-5", Duration::from_secs(300)).await.unwrap();
        gate.clear("sess-5").await.unwrap();
        assert!(!gate.verified_within("sess-5", Duration::from_secs(300)).await);
    }
}
