//! Chain-wide operations: a typed operation record executed across a
//! resolved target set with bounded concurrency, observable progress, and
//! cooperative cancellation at target boundaries.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

use super::hierarchy::{HierarchyEngine, Property};

const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainOperationType {
    ConfigUpdate,
    Deploy,
    Policy,
    RateUpdate,
    Promo,
    Maintenance,
    Training,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainOperationStatus {
    Pending,
    Running,
    Completed,
    CompletedWithFailures,
    Cancelled,
}

/// Which properties an operation applies to: an explicit id list, a set
/// of property types, or both (union), minus `exclusions`.
#[derive(Debug, Clone, Default)]
pub struct OperationTargets {
    pub properties: Vec<String>,
    pub property_types: Vec<String>,
    pub exclusions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChainOperation {
    pub op_id: String,
    pub chain_id: String,
    pub op_type: ChainOperationType,
    pub payload: serde_json::Value,
    pub targets: OperationTargets,
}

/// Outcome for a single target property.
#[derive(Debug, Clone)]
pub struct TargetResult {
    pub property_id: String,
    pub succeeded: bool,
    pub error: Option<String>,
}

/// Snapshot of an in-flight or finished execution.
#[derive(Debug, Clone)]
pub struct ExecutionProgress {
    pub total: usize,
    pub completed: usize,
    pub status: ChainOperationStatus,
    pub results: Vec<TargetResult>,
}

impl ExecutionProgress {
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }
}

pub type OperationHandler = Arc<
    dyn Fn(Property, serde_json::Value) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>
        + Send
        + Sync,
>;

/// Resolve an operation's target set against the chain's property tree:
/// union of explicit ids and type matches, minus exclusions.
pub fn resolve_targets(engine: &HierarchyEngine, targets: &OperationTargets) -> Vec<Property> {
    let mut resolved: Vec<Property> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for id in &targets.properties {
        if let Some(property) = engine.get(id) {
            if seen.insert(property.id.clone()) {
                resolved.push(property);
            }
        }
    }
    for property_type in &targets.property_types {
        for property in engine.properties_by_type(property_type) {
            if seen.insert(property.id.clone()) {
                resolved.push(property);
            }
        }
    }

    resolved.retain(|p| !targets.exclusions.contains(&p.id));
    resolved
}

/// Executes a [`ChainOperation`] against its resolved target set with
/// bounded concurrency (default 5). In-flight handlers run to completion
/// on cancellation; only targets not yet started are skipped.
pub async fn execute(
    engine: &HierarchyEngine,
    operation: &ChainOperation,
    handler: OperationHandler,
    concurrency: Option<usize>,
    cancel: CancellationToken,
) -> ExecutionProgress {
    let targets = resolve_targets(engine, &operation.targets);
    let total = targets.len();
    let completed = Arc::new(AtomicUsize::new(0));
    let semaphore = Arc::new(Semaphore::new(concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1)));

    let mut handles = Vec::with_capacity(total);
    let mut cancelled_before_start = false;

    for property in targets {
        if cancel.is_cancelled() {
            cancelled_before_start = true;
            break;
        }
        let semaphore = Arc::clone(&semaphore);
        let handler = Arc::clone(&handler);
        let payload = operation.payload.clone();
        let completed = Arc::clone(&completed);

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            let property_id = property.id.clone();
            let result = handler(property, payload).await;
            completed.fetch_add(1, Ordering::AcqRel);
            TargetResult {
                property_id,
                succeeded: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            }
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        if let Ok(result) = handle.await {
            results.push(result);
        }
    }

    let any_failed = results.iter().any(|r| !r.succeeded);
    let status = if cancelled_before_start {
        ChainOperationStatus::Cancelled
    } else if any_failed {
        ChainOperationStatus::CompletedWithFailures
    } else {
        ChainOperationStatus::Completed
    };

    ExecutionProgress { total, completed: results.len(), status, results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::config::InheritanceMode;
    use crate::tenant::hierarchy::{Chain, HierarchyEngine};

    fn engine_with_hotels(n: usize) -> HierarchyEngine {
        let engine = HierarchyEngine::new(Chain { id: "chain-1".into(), policies: serde_json::json!({}) });
        engine.add_property("hq", None, "hq", InheritanceMode::None, serde_json::json!({})).unwrap();
        for i in 0..n {
            engine
                .add_property(
                    format!("prop-{i}"),
                    Some("hq".into()),
                    "hotel",
                    InheritanceMode::None,
                    serde_json::json!({}),
                )
                .unwrap();
        }
        engine
    }

    fn noop_handler() -> OperationHandler {
        Arc::new(|_property, _payload| Box::pin(async { Ok(()) }))
    }

    #[tokio::test]
    async fn runs_across_all_type_matched_targets() {
        let engine = engine_with_hotels(3);
        let operation = ChainOperation {
            op_id: "op-1".into(),
            chain_id: "chain-1".into(),
            op_type: ChainOperationType::ConfigUpdate,
            payload: serde_json::json!({}),
            targets: OperationTargets { property_types: vec!["hotel".into()], ..Default::default() },
        };

        let progress = execute(&engine, &operation, noop_handler(), None, CancellationToken::new()).await;
        assert_eq!(progress.total, 3);
        assert_eq!(progress.completed, 3);
        assert_eq!(progress.status, ChainOperationStatus::Completed);
        assert_eq!(progress.percent_complete(), 100.0);
    }

    #[tokio::test]
    async fn exclusions_are_subtracted() {
        let engine = engine_with_hotels(3);
        let operation = ChainOperation {
            op_id: "op-1".into(),
            chain_id: "chain-1".into(),
            op_type: ChainOperationType::Policy,
            payload: serde_json::json!({}),
            targets: OperationTargets {
                property_types: vec!["hotel".into()],
                exclusions: vec!["prop-1".into()],
                ..Default::default()
            },
        };

        let progress = execute(&engine, &operation, noop_handler(), None, CancellationToken::new()).await;
        assert_eq!(progress.total, 2);
        assert!(!progress.results.iter().any(|r| r.property_id == "prop-1"));
    }

    #[tokio::test]
    async fn failed_targets_are_recorded_not_aborting_the_rest() {
        let engine = engine_with_hotels(2);
        let handler: OperationHandler = Arc::new(|property, _payload| {
            Box::pin(async move {
                if property.id == "prop-0" {
                    Err(Error::Internal("boom".into()))
                } else {
                    Ok(())
                }
            })
        });

        let operation = ChainOperation {
            op_id: "op-1".into(),
            chain_id: "chain-1".into(),
            op_type: ChainOperationType::Deploy,
            payload: serde_json::json!({}),
            targets: OperationTargets { property_types: vec!["hotel".into()], ..Default::default() },
        };

        let progress = execute(&engine, &operation, handler, None, CancellationToken::new()).await;
        assert_eq!(progress.status, ChainOperationStatus::CompletedWithFailures);
        assert_eq!(progress.results.iter().filter(|r| r.succeeded).count(), 1);
    }

    #[tokio::test]
    async fn cancellation_before_launch_skips_targets() {
        let engine = engine_with_hotels(3);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let operation = ChainOperation {
            op_id: "op-1".into(),
            chain_id: "chain-1".into(),
            op_type: ChainOperationType::Maintenance,
            payload: serde_json::json!({}),
            targets: OperationTargets { property_types: vec!["hotel".into()], ..Default::default() },
        };

        let progress = execute(&engine, &operation, noop_handler(), None, cancel).await;
        assert_eq!(progress.status, ChainOperationStatus::Cancelled);
        assert_eq!(progress.completed, 0);
    }
}
