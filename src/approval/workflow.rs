//! The approval request state machine: `pending -> approved | rejected |
//! expired`. Terminal states never transition.

use chrono::{DateTime, Utc};

use crate::approval::rules::{self, Requirements};
use crate::approval::types::{ApprovalDecision, ApprovalRequest, ApprovalStatus, ChangedField, Decision};
use crate::config::ApprovalConfig;
use crate::error::Error;

const EMERGENCY_ROLES: &[&str] = &["emergency-responder", "security-admin"];

/// Creates a new request, deriving approvers/priority/expiry from the
/// rule table.
pub fn create_request(
    config: &ApprovalConfig,
    environment: &str,
    changes: Vec<ChangedField>,
    justification: &str,
    impact: &str,
    rollback_plan: &str,
    now: DateTime<Utc>,
) -> Result<ApprovalRequest, Error> {
    if changes.is_empty() {
        return Err(Error::ValidationError("approval request must include at least one change".to_string()));
    }
    if justification.trim().is_empty() {
        return Err(Error::ValidationError("approval request requires a justification".to_string()));
    }

    let paths: Vec<String> = changes.iter().map(|c| c.path.clone()).collect();
    let Requirements { required_approvers, priority, expiry, allow_emergency_override } =
        rules::resolve(config, environment, &paths);

    let expires_at = now
        + chrono::Duration::from_std(expiry).map_err(|e| Error::Internal(format!("invalid expiry duration: {e}")))?;

    Ok(ApprovalRequest {
        id: uuid::Uuid::new_v4(),
        environment: environment.to_string(),
        changes,
        justification: justification.to_string(),
        impact: impact.to_string(),
        rollback_plan: rollback_plan.to_string(),
        priority,
        required_approvers,
        allow_emergency_override,
        approvals: Vec::new(),
        status: ApprovalStatus::Pending,
        created_at: now,
        expires_at,
    })
}

/// Transitions `request` to `Expired` if its deadline has passed. No-op
/// (returns `false`) if already terminal or not yet due.
pub fn expire_if_due(request: &mut ApprovalRequest, now: DateTime<Utc>) -> bool {
    if request.status.is_terminal() {
        return false;
    }
    if now >= request.expires_at {
        request.status = ApprovalStatus::Expired;
        return true;
    }
    false
}

/// Records one approver's decision. Rejects once any required role
/// rejects; approves once every required role has an approving
/// decision. Errors if the request is already terminal (including newly
/// expired by `now`).
pub fn record_decision(
    request: &mut ApprovalRequest,
    approver_id: &str,
    role: &str,
    decision: Decision,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    if expire_if_due(request, now) {
        return Err(Error::Conflict("approval request expired".to_string()));
    }
    if request.status.is_terminal() {
        return Err(Error::Conflict(format!("approval request already {:?}", request.status)));
    }

    request.approvals.push(ApprovalDecision {
        approver_id: approver_id.to_string(),
        role: role.to_string(),
        decision,
        reason,
        at: now,
    });

    match decision {
        Decision::Reject if request.required_approvers.iter().any(|r| r == role) => {
            request.status = ApprovalStatus::Rejected;
        }
        Decision::Approve if request.outstanding_approvers().is_empty() => {
            request.status = ApprovalStatus::Approved;
        }
        _ => {}
    }

    Ok(())
}

/// Resolves a still-pending request via emergency override: requires an
/// opted-in rule, an emergency-responder or security-admin role, and a
/// non-empty justification. Bypasses any remaining required approvers.
pub fn emergency_override(
    request: &mut ApprovalRequest,
    actor_role: &str,
    justification: &str,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    if request.status.is_terminal() {
        return Err(Error::Conflict(format!("approval request already {:?}", request.status)));
    }
    if !request.allow_emergency_override {
        return Err(Error::Auth("this approval request does not permit emergency override".to_string()));
    }
    if !EMERGENCY_ROLES.contains(&actor_role) {
        return Err(Error::Auth(format!("role '{actor_role}' may not invoke emergency override")));
    }
    if justification.trim().is_empty() {
        return Err(Error::ValidationError("emergency override requires a written justification".to_string()));
    }

    request.approvals.push(ApprovalDecision {
        approver_id: actor_role.to_string(),
        role: actor_role.to_string(),
        decision: Decision::Approve,
        reason: Some(format!("EMERGENCY OVERRIDE: {justification}")),
        at: now,
    });
    request.status = ApprovalStatus::Approved;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApprovalRule;

    fn change(path: &str) -> ChangedField {
        ChangedField { path: path.to_string(), old_value: serde_json::json!(1), new_value: serde_json::json!(2) }
    }

    fn config_with_rule() -> ApprovalConfig {
        ApprovalConfig {
            rules: vec![ApprovalRule {
                field_path: "auth.*".to_string(),
                required_approvers: vec!["security-admin".to_string()],
                priority: 3,
                expiry_h: 24,
                allow_emergency_override: true,
            }],
            production_requires_platform_admin: false,
        }
    }

    #[test]
    fn rejects_empty_change_set() {
        let now = "2026-01-01T00:00:00Z".parse().unwrap();
        let result = create_request(&ApprovalConfig::default(), "staging", vec![], "why", "impact", "plan", now);
        assert!(result.is_err());
    }

    #[test]
    fn approves_once_all_required_roles_approve() {
        let now: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let config = config_with_rule();
        let mut request =
            create_request(&config, "staging", vec![change("auth.jwt_secret_key")], "rotate", "low", "revert", now)
                .unwrap();

        record_decision(&mut request, "alice", "security-admin", Decision::Approve, None, now).unwrap();
        assert_eq!(request.status, ApprovalStatus::Approved);
    }

    #[test]
    fn any_required_role_reject_rejects_the_whole_request() {
        let now: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let config = config_with_rule();
        let mut request =
            create_request(&config, "staging", vec![change("auth.jwt_secret_key")], "rotate", "low", "revert", now)
                .unwrap();

        record_decision(&mut request, "bob", "security-admin", Decision::Reject, Some("no".to_string()), now)
            .unwrap();
        assert_eq!(request.status, ApprovalStatus::Rejected);
    }

    #[test]
    fn terminal_requests_refuse_further_decisions() {
        let now: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let config = config_with_rule();
        let mut request =
            create_request(&config, "staging", vec![change("auth.jwt_secret_key")], "rotate", "low", "revert", now)
                .unwrap();

        record_decision(&mut request, "alice", "security-admin", Decision::Approve, None, now).unwrap();
        let result = record_decision(&mut request, "carol", "security-admin", Decision::Reject, None, now);
        assert!(result.is_err());
    }

    #[test]
    fn past_deadline_transitions_to_expired_on_next_touch() {
        let created: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let config = config_with_rule();
        let mut request = create_request(
            &config,
            "staging",
            vec![change("auth.jwt_secret_key")],
            "rotate",
            "low",
            "revert",
            created,
        )
        .unwrap();

        let later = created + chrono::Duration::hours(25);
        let result = record_decision(&mut request, "alice", "security-admin", Decision::Approve, None, later);
        assert!(result.is_err());
        assert_eq!(request.status, ApprovalStatus::Expired);
    }

    #[test]
    fn emergency_override_requires_opted_in_rule() {
        let now: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let mut request =
            create_request(&ApprovalConfig::default(), "staging", vec![change("random.field")], "why", "low", "plan", now)
                .unwrap();

        let result = emergency_override(&mut request, "security-admin", "critical incident", now);
        assert!(result.is_err());
    }

    #[test]
    fn emergency_override_bypasses_remaining_approvers() {
        let now: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let config = config_with_rule();
        let mut request =
            create_request(&config, "staging", vec![change("auth.jwt_secret_key")], "rotate", "low", "revert", now)
                .unwrap();

        emergency_override(&mut request, "emergency-responder", "active incident INC-42", now).unwrap();
        assert_eq!(request.status, ApprovalStatus::Approved);
    }

    #[test]
    fn emergency_override_requires_justification() {
        let now: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let config = config_with_rule();
        let mut request =
            create_request(&config, "staging", vec![change("auth.jwt_secret_key")], "rotate", "low", "revert", now)
                .unwrap();

        let result = emergency_override(&mut request, "security-admin", "   ", now);
        assert!(result.is_err());
    }
}
