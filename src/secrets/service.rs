//! Audit-emitting façade over [`SecretStore`]: every access is logged
//! with actor/source/method/outcome, and the anomaly detector runs
//! against a caller-supplied access history after each read.

use std::sync::Arc;

use chrono::{DateTime, Utc};

#[cfg(feature = "audit")]
use crate::audit::{AuditEvent, AuditEventKind, AuditLogger, AuditSeverity};
use crate::config::SecretsConfig;
use crate::error::Error;
use crate::secrets::anomaly::{self, above_alert_threshold};
use crate::secrets::rotation::{self, RotationOutcome};
use crate::secrets::store::{AccessContext, SecretStore};
use crate::secrets::types::{AccessEvent, Anomaly, RotationStrategy, SecretMetadata, SecretType};

pub struct SecretService {
    store: Arc<SecretStore>,
    config: SecretsConfig,
    #[cfg(feature = "audit")]
    audit: Option<AuditLogger>,
}

impl SecretService {
    pub fn new(store: Arc<SecretStore>, config: SecretsConfig) -> Self {
        Self {
            store,
            config,
            #[cfg(feature = "audit")]
            audit: None,
        }
    }

    #[cfg(feature = "audit")]
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    #[cfg(feature = "audit")]
    async fn emit(&self, kind: AuditEventKind, severity: AuditSeverity, secret_id: &str, metadata: serde_json::Value) {
        if let Some(audit) = &self.audit {
            let mut fields = match metadata {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            };
            fields.insert("secret_id".to_string(), serde_json::Value::String(secret_id.to_string()));
            let event = AuditEvent::new(kind, severity, audit.service_name().to_string())
                .with_metadata(serde_json::Value::Object(fields));
            audit.log(event).await;
        }
    }

    pub async fn create(
        &self,
        secret_id: &str,
        secret_type: SecretType,
        strategy: RotationStrategy,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<String, Error> {
        self.store.create(secret_id, secret_type, strategy, tags, now).await
    }

    /// Reads a secret's value, recording an audit event on both success
    /// and failure. Failures still produce an event (`success: false`),
    /// matching the spec's requirement that every access attempt is
    /// auditable regardless of outcome.
    pub async fn access(&self, secret_id: &str, ctx: &AccessContext, now: DateTime<Utc>) -> Result<String, Error> {
        let result = self.store.access(secret_id, now).await;

        #[cfg(feature = "audit")]
        {
            let (success, reason) = match &result {
                Ok(_) => (true, None),
                Err(e) => (false, Some(e.to_string())),
            };
            self.emit(
                AuditEventKind::SecretAccessed,
                if success { AuditSeverity::Informational } else { AuditSeverity::Warning },
                secret_id,
                serde_json::json!({
                    "actor": ctx.actor,
                    "source_ip": ctx.source_ip,
                    "user_agent": ctx.user_agent,
                    "method": ctx.method,
                    "success": success,
                    "reason": reason,
                }),
            )
            .await;
        }

        result.map(|(value, _metadata)| value)
    }

    pub async fn rotate(&self, secret_id: &str, now: DateTime<Utc>) -> Result<String, Error> {
        let result = self.store.rotate(secret_id, now).await;

        #[cfg(feature = "audit")]
        self.emit(
            AuditEventKind::SecretRotated,
            AuditSeverity::Notice,
            secret_id,
            serde_json::json!({ "emergency": false }),
        )
        .await;

        result
    }

    pub async fn emergency_rotate_all(&self, secret_type: SecretType, concurrency: Option<usize>, now: DateTime<Utc>) -> Vec<RotationOutcome> {
        let outcomes = rotation::emergency_rotate_all(&self.store, secret_type, concurrency, now).await;

        #[cfg(feature = "audit")]
        for outcome in &outcomes {
            self.emit(
                AuditEventKind::SecretRotated,
                AuditSeverity::Warning,
                &outcome.secret_id,
                serde_json::json!({ "emergency": true, "success": outcome.result.is_ok() }),
            )
            .await;
        }

        outcomes
    }

    pub async fn metadata(&self, secret_id: &str) -> Result<SecretMetadata, Error> {
        self.store.metadata(secret_id).await
    }

    /// Classifies `events` (already filtered to `secret_id` and the
    /// analysis window by the caller) and emits an alert for anything
    /// at or above the configured risk threshold.
    pub async fn check_anomalies(&self, secret_id: &str, events: &[AccessEvent]) -> Vec<Anomaly> {
        let anomalies = anomaly::classify(secret_id, events, &self.config);
        let alerting = above_alert_threshold(&anomalies, &self.config);

        #[cfg(feature = "audit")]
        for anomaly in &alerting {
            self.emit(
                AuditEventKind::SecretAnomalyDetected,
                AuditSeverity::Alert,
                secret_id,
                serde_json::json!({ "kind": format!("{:?}", anomaly.kind), "risk_score": anomaly.risk_score }),
            )
            .await;
        }

        anomalies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::distributed::DistributedCache;
    use crate::config::CacheConfig;
    use crate::secrets::cipher::ValueCipher;

    fn now() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    fn service() -> SecretService {
        let cache = Arc::new(DistributedCache::new("test-secret-service", &CacheConfig::default(), None).unwrap());
        let cipher = ValueCipher::new(&[6u8; 32]).unwrap();
        let store = Arc::new(SecretStore::new(cache, cipher, SecretsConfig::default()));
        SecretService::new(store, SecretsConfig::default())
    }

    fn ctx() -> AccessContext {
        AccessContext { actor: "svc-a".to_string(), source_ip: Some("10.0.0.1".to_string()), user_agent: None, method: "read".to_string() }
    }

    #[tokio::test]
    async fn create_and_access_round_trips() {
        let svc = service();
        let created = svc.create("k1", SecretType::ApiKey, RotationStrategy::Manual, vec![], now()).await.unwrap();
        let read = svc.access("k1", &ctx(), now()).await.unwrap();
        assert_eq!(created, read);
    }

    #[tokio::test]
    async fn access_of_unknown_secret_fails() {
        let svc = service();
        assert!(svc.access("missing", &ctx(), now()).await.is_err());
    }

    #[tokio::test]
    async fn rotate_changes_the_value() {
        let svc = service();
        let created = svc.create("k1", SecretType::ApiKey, RotationStrategy::Manual, vec![], now()).await.unwrap();
        let rotated = svc.rotate("k1", now()).await.unwrap();
        assert_ne!(created, rotated);
    }

    #[tokio::test]
    async fn check_anomalies_flags_excessive_access() {
        let svc = SecretService::new(
            Arc::new(SecretStore::new(
                Arc::new(DistributedCache::new("test-anomaly", &CacheConfig::default(), None).unwrap()),
                ValueCipher::new(&[2u8; 32]).unwrap(),
                SecretsConfig::default(),
            )),
            SecretsConfig { excessive_access_threshold: 1, risk_score_alert_threshold: 0.1, ..SecretsConfig::default() },
        );
        let events: Vec<_> = (0..5)
            .map(|_| AccessEvent {
                secret_id: "k1".to_string(),
                actor: "svc-a".to_string(),
                source_ip: None,
                user_agent: None,
                method: "read".to_string(),
                success: true,
                reason: None,
                at: now(),
            })
            .collect();
        let anomalies = svc.check_anomalies("k1", &events).await;
        assert!(!anomalies.is_empty());
    }
}
