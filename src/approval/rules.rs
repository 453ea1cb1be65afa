//! Resolves the approvers, priority, and expiry that apply to a set of
//! changed fields, merging every matching rule under "the strictest rule
//! among the changes wins".

use std::collections::BTreeSet;
use std::time::Duration;

use crate::config::{ApprovalConfig, ApprovalRule};

const PLATFORM_ADMIN_ROLE: &str = "platform-admin";
const DEFAULT_EXPIRY_H: u64 = 24;
const DEFAULT_PRIORITY: u8 = 0;

/// The requirements derived from matching a change set against the rule
/// table.
#[derive(Debug, Clone)]
pub struct Requirements {
    pub required_approvers: Vec<String>,
    pub priority: u8,
    pub expiry: Duration,
    pub allow_emergency_override: bool,
}

/// `changed_paths` is every field path touched by the request.
/// `environment` is checked against "production" to add the mandatory
/// platform-admin approver. Strictest-wins: highest priority, shortest
/// expiry, union of required approvers; emergency override is allowed
/// only if every rule that matched opts in (the strictest reading of
/// "opt-in" — one non-opting rule is enough to withhold it).
pub fn resolve(config: &ApprovalConfig, environment: &str, changed_paths: &[String]) -> Requirements {
    let matched: Vec<&ApprovalRule> = config
        .rules
        .iter()
        .filter(|rule| changed_paths.iter().any(|path| rule.matches(path)))
        .collect();

    let mut approvers: BTreeSet<String> = BTreeSet::new();
    let mut priority = DEFAULT_PRIORITY;
    let mut expiry_h = DEFAULT_EXPIRY_H;
    let mut allow_emergency_override = !matched.is_empty();

    for rule in &matched {
        approvers.extend(rule.required_approvers.iter().cloned());
        priority = priority.max(rule.priority);
        expiry_h = expiry_h.min(rule.expiry_h);
        allow_emergency_override &= rule.allow_emergency_override;
    }

    if environment.eq_ignore_ascii_case("production") && config.production_requires_platform_admin {
        approvers.insert(PLATFORM_ADMIN_ROLE.to_string());
    }

    Requirements {
        required_approvers: approvers.into_iter().collect(),
        priority,
        expiry: Duration::from_secs(expiry_h * 3600),
        allow_emergency_override,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApprovalRule;

    fn rule(path: &str, approvers: &[&str], priority: u8, expiry_h: u64, override_ok: bool) -> ApprovalRule {
        ApprovalRule {
            field_path: path.to_string(),
            required_approvers: approvers.iter().map(|s| s.to_string()).collect(),
            priority,
            expiry_h,
            allow_emergency_override: override_ok,
        }
    }

    #[test]
    fn unmatched_changes_fall_back_to_defaults() {
        let config = ApprovalConfig { rules: vec![], production_requires_platform_admin: true };
        let req = resolve(&config, "staging", &["unrelated.field".to_string()]);
        assert!(req.required_approvers.is_empty());
        assert_eq!(req.priority, DEFAULT_PRIORITY);
        assert!(!req.allow_emergency_override);
    }

    #[test]
    fn production_adds_platform_admin() {
        let config = ApprovalConfig { rules: vec![], production_requires_platform_admin: true };
        let req = resolve(&config, "production", &["auth.jwt_secret_key".to_string()]);
        assert!(req.required_approvers.contains(&"platform-admin".to_string()));
    }

    #[test]
    fn wildcard_rule_matches_prefix() {
        let config = ApprovalConfig {
            rules: vec![rule("auth.*", &["security-admin"], 1, 12, true)],
            production_requires_platform_admin: false,
        };
        let req = resolve(&config, "staging", &["auth.jwt_secret_key".to_string()]);
        assert!(req.required_approvers.contains(&"security-admin".to_string()));
    }

    #[test]
    fn strictest_rule_wins_across_multiple_matches() {
        let config = ApprovalConfig {
            rules: vec![
                rule("billing.rate", &["finance-admin"], 2, 48, true),
                rule("billing.*", &["platform-admin"], 5, 6, false),
            ],
            production_requires_platform_admin: false,
        };
        let req = resolve(&config, "staging", &["billing.rate".to_string()]);

        assert_eq!(req.priority, 5);
        assert_eq!(req.expiry, Duration::from_secs(6 * 3600));
        assert!(req.required_approvers.contains(&"finance-admin".to_string()));
        assert!(req.required_approvers.contains(&"platform-admin".to_string()));
        assert!(!req.allow_emergency_override);
    }
}
