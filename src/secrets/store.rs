//! Secret create/rotate/access lifecycle. Values and metadata are kept
//! logically separate (see module docs) even though both are backed by
//! the same [`DistributedCache`] instance here; a future implementation
//! could split them onto different backends without changing this
//! interface.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::cache::distributed::{DistributedCache, Tier};
use crate::config::SecretsConfig;
use crate::error::Error;
use crate::secrets::cipher::{EncryptedValue, ValueCipher};
use crate::secrets::generate::generate_value;
use crate::secrets::types::{RotationStrategy, SecretMetadata, SecretStatus, SecretType};

const CACHE_NAMESPACE: &str = "secret";

/// Context describing who is reading a secret, carried through to the
/// access audit event and the anomaly detector.
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub actor: String,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub method: String,
}

#[derive(Clone, Serialize, Deserialize)]
struct SecretRecord {
    metadata: SecretMetadata,
    value: EncryptedValue,
    backups: VecDeque<EncryptedValue>,
}

fn record_key(secret_id: &str) -> String {
    format!("{CACHE_NAMESPACE}:{secret_id}")
}

pub struct SecretStore {
    cache: Arc<DistributedCache<SecretRecord>>,
    cipher: ValueCipher,
    config: SecretsConfig,
    by_type: DashMap<SecretType, Vec<String>>,
}

impl SecretStore {
    pub fn new(cache: Arc<DistributedCache<SecretRecord>>, cipher: ValueCipher, config: SecretsConfig) -> Self {
        Self { cache, cipher, config, by_type: DashMap::new() }
    }

    fn rotation_interval(&self) -> ChronoDuration {
        ChronoDuration::days(i64::from(self.config.rotation_interval_days))
    }

    /// Generates a new value, stores it encrypted, and returns the
    /// plaintext exactly once.
    pub async fn create(
        &self,
        secret_id: &str,
        secret_type: SecretType,
        strategy: RotationStrategy,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<String, Error> {
        let plaintext = generate_value(secret_type);
        let encrypted = self.cipher.encrypt(plaintext.as_bytes())?;

        let metadata = SecretMetadata {
            secret_id: secret_id.to_string(),
            secret_type,
            status: SecretStatus::Active,
            created_at: now,
            expires_at: Some(now + self.rotation_interval()),
            last_rotated: None,
            rotation_count: 0,
            usage_count: 0,
            max_usage: None,
            strategy,
            tags,
        };

        let record = SecretRecord { metadata, value: encrypted, backups: VecDeque::new() };
        self.cache.set(&record_key(secret_id), record, None, Vec::new(), Tier::Both).await?;
        self.by_type.entry(secret_type).or_default().push(secret_id.to_string());

        Ok(plaintext)
    }

    async fn load(&self, secret_id: &str) -> Result<SecretRecord, Error> {
        self.cache
            .get(&record_key(secret_id))
            .await
            .ok_or_else(|| Error::NotFound(format!("secret '{secret_id}' not found")))
    }

    /// Reads a secret's value. Checks status, expiry, and usage cap;
    /// increments `usage_count` on success. Emits no audit event
    /// itself — callers wrap this with [`super::audit_log::record_access`].
    pub async fn access(&self, secret_id: &str, now: DateTime<Utc>) -> Result<(String, SecretMetadata), Error> {
        let mut record = self.load(secret_id).await?;

        if !record.metadata.status.is_usable() {
            return Err(Error::Conflict(format!("secret '{secret_id}' is not active (status {:?})", record.metadata.status)));
        }
        if let Some(expires_at) = record.metadata.expires_at {
            if now >= expires_at {
                record.metadata.status = SecretStatus::Expired;
                self.cache.set(&record_key(secret_id), record.clone(), None, Vec::new(), Tier::Both).await?;
                return Err(Error::Conflict(format!("secret '{secret_id}' has expired")));
            }
        }
        if let Some(max_usage) = record.metadata.max_usage {
            if record.metadata.usage_count >= max_usage {
                return Err(Error::Conflict(format!("secret '{secret_id}' has exceeded its usage cap")));
            }
        }

        let plaintext = self.cipher.decrypt(&record.value)?;
        record.metadata.usage_count += 1;
        let metadata = record.metadata.clone();
        self.cache.set(&record_key(secret_id), record, None, Vec::new(), Tier::Both).await?;

        let value = String::from_utf8(plaintext).map_err(|e| Error::Internal(format!("stored secret was not valid utf-8: {e}")))?;
        Ok((value, metadata))
    }

    /// Rotates a secret: backs up the current value (retaining the last
    /// `backup_retention`), generates a new one, and resets usage and
    /// expiry. The record is only overwritten once the new value has
    /// been generated and encrypted, so a failure here leaves the
    /// previous active value in place untouched.
    pub async fn rotate(&self, secret_id: &str, now: DateTime<Utc>) -> Result<String, Error> {
        let mut record = self.load(secret_id).await?;

        let plaintext = generate_value(record.metadata.secret_type);
        let encrypted = self.cipher.encrypt(plaintext.as_bytes())?;

        record.backups.push_back(record.value.clone());
        while record.backups.len() > self.config.backup_retention {
            record.backups.pop_front();
        }
        record.value = encrypted;
        record.metadata.rotation_count += 1;
        record.metadata.usage_count = 0;
        record.metadata.last_rotated = Some(now);
        record.metadata.expires_at = Some(now + self.rotation_interval());
        record.metadata.status = SecretStatus::Active;

        self.cache.set(&record_key(secret_id), record, None, Vec::new(), Tier::Both).await?;
        Ok(plaintext)
    }

    /// Every secret id registered under `secret_type` since this store
    /// started (or since the process restarted — the index is
    /// in-memory, rebuilt as secrets are created).
    pub fn ids_of_type(&self, secret_type: SecretType) -> Vec<String> {
        self.by_type.get(&secret_type).map(|ids| ids.clone()).unwrap_or_default()
    }

    pub async fn metadata(&self, secret_id: &str) -> Result<SecretMetadata, Error> {
        Ok(self.load(secret_id).await?.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn now() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    fn store() -> SecretStore {
        let cache = Arc::new(DistributedCache::new("test-secrets", &CacheConfig::default(), None).unwrap());
        let cipher = ValueCipher::new(&[9u8; 32]).unwrap();
        SecretStore::new(cache, cipher, SecretsConfig::default())
    }

    #[tokio::test]
    async fn create_then_access_returns_the_same_value() {
        let store = store();
        let created = store.create("api-key-1", SecretType::ApiKey, RotationStrategy::Time, vec![], now()).await.unwrap();

        let (read, metadata) = store.access("api-key-1", now()).await.unwrap();
        assert_eq!(read, created);
        assert_eq!(metadata.usage_count, 1);
    }

    #[tokio::test]
    async fn access_after_expiry_fails_and_marks_expired() {
        let store = store();
        store.create("api-key-1", SecretType::ApiKey, RotationStrategy::Time, vec![], now()).await.unwrap();

        let long_after = now() + ChronoDuration::days(i64::from(SecretsConfig::default().rotation_interval_days) + 1);
        let result = store.access("api-key-1", long_after).await;
        assert!(result.is_err());

        let metadata = store.metadata("api-key-1").await.unwrap();
        assert_eq!(metadata.status, SecretStatus::Expired);
    }

    #[tokio::test]
    async fn rotate_issues_a_new_value_and_resets_usage() {
        let store = store();
        let original = store.create("api-key-1", SecretType::ApiKey, RotationStrategy::Time, vec![], now()).await.unwrap();
        store.access("api-key-1", now()).await.unwrap();

        let rotated = store.rotate("api-key-1", now()).await.unwrap();
        assert_ne!(rotated, original);

        let metadata = store.metadata("api-key-1").await.unwrap();
        assert_eq!(metadata.usage_count, 0);
        assert_eq!(metadata.rotation_count, 1);
    }

    #[tokio::test]
    async fn rotation_history_is_capped_at_backup_retention() {
        let cache = Arc::new(DistributedCache::new("test-secrets-2", &CacheConfig::default(), None).unwrap());
        let cipher = ValueCipher::new(&[9u8; 32]).unwrap();
        let config = SecretsConfig { backup_retention: 2, ..SecretsConfig::default() };
        let store = SecretStore::new(cache, cipher, config);

        store.create("k", SecretType::EncryptionKey, RotationStrategy::Manual, vec![], now()).await.unwrap();
        for _ in 0..5 {
            store.rotate("k", now()).await.unwrap();
        }

        let record = store.load("k").await.unwrap();
        assert_eq!(record.backups.len(), 2);
    }

    #[tokio::test]
    async fn ids_of_type_tracks_created_secrets() {
        let store = store();
        store.create("k1", SecretType::ApiKey, RotationStrategy::Manual, vec![], now()).await.unwrap();
        store.create("k2", SecretType::ApiKey, RotationStrategy::Manual, vec![], now()).await.unwrap();
        store.create("p1", SecretType::Password, RotationStrategy::Manual, vec![], now()).await.unwrap();

        let mut ids = store.ids_of_type(SecretType::ApiKey);
        ids.sort();
        assert_eq!(ids, vec!["k1".to_string(), "k2".to_string()]);
    }
}
