//! Access anomaly detection: classifies a rolling window of
//! [`AccessEvent`]s for a secret into the five patterns the platform
//! watches for, each carrying a normalized risk score.

use chrono::{DateTime, Timelike, Utc};
use std::collections::HashSet;

use crate::config::SecretsConfig;
use crate::secrets::types::{risk_score, AccessEvent, Anomaly, AnomalyKind};

const OFF_HOURS_START: u32 = 22;
const OFF_HOURS_END: u32 = 6;

fn is_off_hours(at: DateTime<Utc>) -> bool {
    let hour = at.hour();
    hour >= OFF_HOURS_START || hour < OFF_HOURS_END
}

/// Classifies `events` (already filtered to the last `W` hours and to a
/// single `secret_id`) against `config`'s thresholds. More than one
/// classification may fire for the same window.
pub fn classify(secret_id: &str, events: &[AccessEvent], config: &SecretsConfig) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    let total = events.len() as f64;
    if total > f64::from(config.excessive_access_threshold) {
        anomalies.push(Anomaly {
            secret_id: secret_id.to_string(),
            kind: AnomalyKind::ExcessiveAccess,
            observed: total,
            threshold: f64::from(config.excessive_access_threshold),
            risk_score: risk_score(total, f64::from(config.excessive_access_threshold)),
        });
    }

    let failures = events.iter().filter(|e| !e.success).count() as f64;
    if failures > f64::from(config.failed_attempts_threshold) {
        anomalies.push(Anomaly {
            secret_id: secret_id.to_string(),
            kind: AnomalyKind::FailedAttempts,
            observed: failures,
            threshold: f64::from(config.failed_attempts_threshold),
            risk_score: risk_score(failures, f64::from(config.failed_attempts_threshold)),
        });
    }

    if total > 0.0 {
        let off_hours = events.iter().filter(|e| is_off_hours(e.at)).count() as f64;
        let ratio = off_hours / total;
        if ratio > config.off_hours_ratio_threshold {
            anomalies.push(Anomaly {
                secret_id: secret_id.to_string(),
                kind: AnomalyKind::UnusualTime,
                observed: ratio,
                threshold: config.off_hours_ratio_threshold,
                risk_score: risk_score(ratio, config.off_hours_ratio_threshold),
            });
        }
    }

    if !config.allowed_countries.is_empty() {
        let violating = events
            .iter()
            .filter(|e| e.source_ip.as_deref().map(|ip| !is_allowed_country(ip, &config.allowed_countries)).unwrap_or(false))
            .count() as f64;
        if violating > 0.0 {
            anomalies.push(Anomaly {
                secret_id: secret_id.to_string(),
                kind: AnomalyKind::GeographicViolation,
                observed: violating,
                threshold: 0.0,
                risk_score: 1.0,
            });
        }
    }

    let concurrent_actors: HashSet<&str> = events.iter().map(|e| e.actor.as_str()).collect();
    let concurrent = concurrent_actors.len() as f64;
    if concurrent > f64::from(config.concurrent_access_threshold) {
        anomalies.push(Anomaly {
            secret_id: secret_id.to_string(),
            kind: AnomalyKind::ConcurrentAccess,
            observed: concurrent,
            threshold: f64::from(config.concurrent_access_threshold),
            risk_score: risk_score(concurrent, f64::from(config.concurrent_access_threshold)),
        });
    }

    anomalies
}

/// Country allow-list membership is resolved upstream (this crate does
/// not ship a geo-IP database); `source_ip` here is expected to already
/// carry a resolved ISO country code when the allow-list feature is in
/// use, falling back to "unknown" otherwise.
fn is_allowed_country(resolved_country: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|c| c.eq_ignore_ascii_case(resolved_country))
}

/// Anomalies whose risk score meets or exceeds the alert threshold.
pub fn above_alert_threshold(anomalies: &[Anomaly], config: &SecretsConfig) -> Vec<Anomaly> {
    anomalies.iter().filter(|a| a.risk_score >= config.risk_score_alert_threshold).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(actor: &str, success: bool, hour: u32) -> AccessEvent {
        let at = "2026-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap().with_hour(hour).unwrap();
        AccessEvent {
            secret_id: "s1".to_string(),
            actor: actor.to_string(),
            source_ip: Some("US".to_string()),
            user_agent: None,
            method: "read".to_string(),
            success,
            reason: None,
            at,
        }
    }

    #[test]
    fn excessive_access_fires_above_threshold() {
        let config = SecretsConfig { excessive_access_threshold: 2, ..SecretsConfig::default() };
        let events: Vec<_> = (0..5).map(|_| event("alice", true, 10)).collect();
        let anomalies = classify("s1", &events, &config);
        assert!(anomalies.iter().any(|a| a.kind == AnomalyKind::ExcessiveAccess));
    }

    #[test]
    fn failed_attempts_fires_above_threshold() {
        let config = SecretsConfig { failed_attempts_threshold: 1, ..SecretsConfig::default() };
        let events = vec![event("alice", false, 10), event("alice", false, 10), event("alice", false, 10)];
        let anomalies = classify("s1", &events, &config);
        assert!(anomalies.iter().any(|a| a.kind == AnomalyKind::FailedAttempts));
    }

    #[test]
    fn unusual_time_fires_when_mostly_off_hours() {
        let config = SecretsConfig { off_hours_ratio_threshold: 0.5, ..SecretsConfig::default() };
        let events = vec![event("alice", true, 23), event("alice", true, 2), event("alice", true, 14)];
        let anomalies = classify("s1", &events, &config);
        assert!(anomalies.iter().any(|a| a.kind == AnomalyKind::UnusualTime));
    }

    #[test]
    fn concurrent_access_fires_above_threshold() {
        let config = SecretsConfig { concurrent_access_threshold: 2, ..SecretsConfig::default() };
        let events = vec![event("alice", true, 10), event("bob", true, 10), event("carol", true, 10)];
        let anomalies = classify("s1", &events, &config);
        assert!(anomalies.iter().any(|a| a.kind == AnomalyKind::ConcurrentAccess));
    }

    #[test]
    fn quiet_window_produces_no_anomalies() {
        let config = SecretsConfig::default();
        let events = vec![event("alice", true, 10)];
        assert!(classify("s1", &events, &config).is_empty());
    }

    #[test]
    fn above_alert_threshold_filters_low_risk_anomalies() {
        let config = SecretsConfig { risk_score_alert_threshold: 0.9, ..SecretsConfig::default() };
        let anomalies = vec![
            Anomaly { secret_id: "s1".to_string(), kind: AnomalyKind::ExcessiveAccess, observed: 1.0, threshold: 10.0, risk_score: 0.1 },
            Anomaly { secret_id: "s1".to_string(), kind: AnomalyKind::FailedAttempts, observed: 9.0, threshold: 10.0, risk_score: 0.95 },
        ];
        let alerting = above_alert_threshold(&anomalies, &config);
        assert_eq!(alerting.len(), 1);
        assert_eq!(alerting[0].kind, AnomalyKind::FailedAttempts);
    }
}
