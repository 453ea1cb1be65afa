//! Configuration change approval: multi-role sign-off on sensitive
//! config changes before they take effect, with a strictest-rule-wins
//! requirement derivation and an emergency override escape hatch.

pub mod rules;
#[cfg(feature = "audit")]
pub mod service;
pub mod types;
pub mod workflow;

pub use rules::{resolve, Requirements};
#[cfg(feature = "audit")]
pub use service::ApprovalService;
pub use types::{ApprovalDecision, ApprovalRequest, ApprovalStatus, ChangedField, Decision};
pub use workflow::{create_request, emergency_override, expire_if_due, record_decision};
