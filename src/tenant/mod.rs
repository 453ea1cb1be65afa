//! Tenant & Chain Hierarchy Engine: the property tree, effective-config
//! resolution across inheritance modes, and the chain-wide operation
//! executor.

pub mod config;
pub mod hierarchy;
pub mod operations;

pub use config::InheritanceMode;
pub use hierarchy::{Chain, HierarchyEngine, Property, PropertyStatus, MAX_DEPTH};
pub use operations::{
    execute as execute_chain_operation, resolve_targets, ChainOperation, ChainOperationStatus,
    ChainOperationType, ExecutionProgress, OperationHandler, OperationTargets, TargetResult,
};
