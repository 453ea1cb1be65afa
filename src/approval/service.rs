//! Thin audit-emitting wrapper around the approval state machine.
//! Holds no request state itself; callers persist [`ApprovalRequest`]
//! and pass it back in on each call.

use chrono::{DateTime, Utc};

#[cfg(feature = "audit")]
use crate::audit::{AuditEvent, AuditEventKind, AuditLogger, AuditSeverity};
use crate::approval::types::{ApprovalRequest, ApprovalStatus, ChangedField, Decision};
use crate::approval::workflow;
use crate::config::ApprovalConfig;
use crate::error::Error;

pub struct ApprovalService {
    config: ApprovalConfig,
    #[cfg(feature = "audit")]
    audit: Option<AuditLogger>,
}

impl ApprovalService {
    pub fn new(config: ApprovalConfig) -> Self {
        Self {
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
    async fn emit(&self, kind: AuditEventKind, severity: AuditSeverity, request_id: &str, metadata: serde_json::Value) {
        if let Some(audit) = &self.audit {
            let mut fields = match metadata {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            };
            fields.insert("request_id".to_string(), serde_json::Value::String(request_id.to_string()));
            let event = AuditEvent::new(kind, severity, audit.service_name().to_string())
                .with_metadata(serde_json::Value::Object(fields));
            audit.log(event).await;
        }
    }

    pub async fn create_request(
        &self,
        environment: &str,
        changes: Vec<ChangedField>,
        justification: &str,
        impact: &str,
        rollback_plan: &str,
        now: DateTime<Utc>,
    ) -> Result<ApprovalRequest, Error> {
        let request = workflow::create_request(&self.config, environment, changes, justification, impact, rollback_plan, now)?;

        #[cfg(feature = "audit")]
        self.emit(
            AuditEventKind::ApprovalRequested,
            AuditSeverity::Notice,
            &request.id.to_string(),
            serde_json::json!({
                "environment": request.environment,
                "priority": request.priority,
                "required_approvers": request.required_approvers,
            }),
        )
        .await;

        Ok(request)
    }

    pub async fn record_decision(
        &self,
        request: &mut ApprovalRequest,
        approver_id: &str,
        role: &str,
        decision: Decision,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        workflow::record_decision(request, approver_id, role, decision, reason, now)?;

        #[cfg(feature = "audit")]
        {
            self.emit(
                AuditEventKind::ApprovalDecisionRecorded,
                AuditSeverity::Informational,
                &request.id.to_string(),
                serde_json::json!({ "approver_id": approver_id, "role": role, "decision": format!("{decision:?}") }),
            )
            .await;

            if request.status.is_terminal() {
                self.emit(
                    AuditEventKind::ApprovalResolved,
                    AuditSeverity::Notice,
                    &request.id.to_string(),
                    serde_json::json!({ "status": format!("{:?}", request.status) }),
                )
                .await;
            }
        }

        Ok(())
    }

    pub async fn emergency_override(
        &self,
        request: &mut ApprovalRequest,
        actor_role: &str,
        justification: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        workflow::emergency_override(request, actor_role, justification, now)?;

        #[cfg(feature = "audit")]
        self.emit(
            AuditEventKind::ApprovalEmergencyOverride,
            AuditSeverity::Critical,
            &request.id.to_string(),
            serde_json::json!({ "actor_role": actor_role, "justification": justification }),
        )
        .await;

        Ok(())
    }

    /// Sweeps a request for expiry without recording a decision; callers
    /// run this periodically against their stored pending requests.
    pub async fn expire_if_due(&self, request: &mut ApprovalRequest, now: DateTime<Utc>) -> bool {
        let expired = workflow::expire_if_due(request, now);

        #[cfg(feature = "audit")]
        if expired {
            self.emit(
                AuditEventKind::ApprovalResolved,
                AuditSeverity::Notice,
                &request.id.to_string(),
                serde_json::json!({ "status": "Expired" }),
            )
            .await;
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApprovalRule;

    fn change(path: &str) -> ChangedField {
        ChangedField { path: path.to_string(), old_value: serde_json::json!(1), new_value: serde_json::json!(2) }
    }

    fn config() -> ApprovalConfig {
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

    #[tokio::test]
    async fn create_and_approve_flow() {
        let svc = ApprovalService::new(config());
        let now: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();

        let mut request = svc
            .create_request("staging", vec![change("auth.jwt_secret_key")], "rotate secret", "low", "roll back key", now)
            .await
            .unwrap();

        svc.record_decision(&mut request, "alice", "security-admin", Decision::Approve, None, now)
            .await
            .unwrap();

        assert_eq!(request.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn expire_if_due_flags_overdue_requests() {
        let svc = ApprovalService::new(config());
        let created: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();

        let mut request = svc
            .create_request("staging", vec![change("auth.jwt_secret_key")], "rotate secret", "low", "roll back key", created)
            .await
            .unwrap();

        let later = created + chrono::Duration::hours(25);
        assert!(svc.expire_if_due(&mut request, later).await);
        assert_eq!(request.status, ApprovalStatus::Expired);
    }
}
