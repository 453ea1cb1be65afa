//! Types for a configuration-change approval request: the change set,
//! the derived approval requirements, and the decisions recorded
//! against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single changed configuration field, identified by its dotted path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedField {
    pub path: String,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approve,
    Reject,
}

/// One approver's recorded decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approver_id: String,
    pub role: String,
    pub decision: Decision,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Terminal states never transition once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// A configuration-change approval request. `required_approvers`,
/// `priority`, `expires_at`, and `allow_emergency_override` are derived
/// from the rule table at creation time (see [`super::rules`]), not
/// supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub environment: String,
    pub changes: Vec<ChangedField>,
    pub justification: String,
    pub impact: String,
    pub rollback_plan: String,
    pub priority: u8,
    pub required_approvers: Vec<String>,
    pub allow_emergency_override: bool,
    pub approvals: Vec<ApprovalDecision>,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Roles named in `required_approvers` that have not yet recorded an
    /// approving decision.
    pub fn outstanding_approvers(&self) -> Vec<String> {
        self.required_approvers
            .iter()
            .filter(|role| {
                !self
                    .approvals
                    .iter()
                    .any(|d| &d.role == *role && d.decision == Decision::Approve)
            })
            .cloned()
            .collect()
    }
}
