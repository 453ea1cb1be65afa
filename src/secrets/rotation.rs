//! Emergency rotation: rotate every secret of a given type with bounded
//! concurrency, for incident response when a credential class may be
//! compromised.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use crate::error::Error;
use crate::secrets::store::SecretStore;
use crate::secrets::types::SecretType;

const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone)]
pub struct RotationOutcome {
    pub secret_id: String,
    pub result: Result<(), String>,
}

/// Rotates every secret registered under `secret_type`. Each rotation is
/// independent; one failure does not stop the others. `concurrency`
/// bounds how many rotations run in parallel (default 5).
pub async fn emergency_rotate_all(
    store: &Arc<SecretStore>,
    secret_type: SecretType,
    concurrency: Option<usize>,
    now: DateTime<Utc>,
) -> Vec<RotationOutcome> {
    let ids = store.ids_of_type(secret_type);
    let semaphore = Arc::new(Semaphore::new(concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1)));

    let mut handles = Vec::with_capacity(ids.len());
    for secret_id in ids {
        let store = Arc::clone(store);
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            let result = store.rotate(&secret_id, now).await.map(|_| ()).map_err(|e: Error| e.to_string());
            RotationOutcome { secret_id, result }
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        if let Ok(outcome) = handle.await {
            outcomes.push(outcome);
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::distributed::DistributedCache;
    use crate::config::{CacheConfig, SecretsConfig};
    use crate::secrets::cipher::ValueCipher;
    use crate::secrets::types::RotationStrategy;

    fn now() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    async fn store() -> Arc<SecretStore> {
        let cache = Arc::new(DistributedCache::new("test-rotation", &CacheConfig::default(), None).unwrap());
        let cipher = ValueCipher::new(&[4u8; 32]).unwrap();
        Arc::new(SecretStore::new(cache, cipher, SecretsConfig::default()))
    }

    #[tokio::test]
    async fn rotates_every_secret_of_the_given_type() {
        let store = store().await;
        for id in ["a", "b", "c"] {
            store.create(id, SecretType::ApiKey, RotationStrategy::Emergency, vec![], now()).await.unwrap();
        }

        let outcomes = emergency_rotate_all(&store, SecretType::ApiKey, Some(2), now()).await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));

        for id in ["a", "b", "c"] {
            let metadata = store.metadata(id).await.unwrap();
            assert_eq!(metadata.rotation_count, 1);
        }
    }

    #[tokio::test]
    async fn unrelated_types_are_left_untouched() {
        let store = store().await;
        store.create("pw", SecretType::Password, RotationStrategy::Manual, vec![], now()).await.unwrap();

        let outcomes = emergency_rotate_all(&store, SecretType::ApiKey, None, now()).await;
        assert!(outcomes.is_empty());

        let metadata = store.metadata("pw").await.unwrap();
        assert_eq!(metadata.rotation_count, 0);
    }
}
