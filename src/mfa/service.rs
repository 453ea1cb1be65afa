//! Ties together TOTP, at-rest secret encryption, recovery codes, and
//! session gating into the enrollment/verification workflow, emitting
//! an audit event for every state-changing step.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

#[cfg(feature = "audit")]
use crate::audit::{AuditEvent, AuditEventKind, AuditLogger, AuditSeverity};
use crate::config::MfaConfig;
use crate::error::Error;
use crate::mfa::recovery::{self, HashedRecoveryCode};
use crate::mfa::secret_store::{EncryptedSecret, SecretCipher};
use crate::mfa::session::SessionGate;
use crate::mfa::totp;

/// Everything persisted for one account's MFA enrollment. Callers own
/// storage (database, KV, etc); this type is the unit that gets
/// written and read back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaEnrollment {
    pub account_id: String,
    pub encrypted_secret: EncryptedSecret,
    pub recovery_codes: Vec<HashedRecoveryCode>,
    pub enrolled: bool,
}

/// A freshly-started (not yet confirmed) enrollment: the caller shows
/// `provisioning_uri` to the user and asks for the first TOTP code.
pub struct PendingEnrollment {
    pub account_id: String,
    pub provisioning_uri: String,
    raw_secret: [u8; 20],
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Orchestrates enrollment, verification, recovery, and session gating
/// for MFA. Holds no account state itself; callers persist
/// [`MfaEnrollment`] and pass it back in on each call.
pub struct MfaService {
    cipher: SecretCipher,
    pub session_gate: SessionGate,
    config: MfaConfig,
    #[cfg(feature = "audit")]
    audit: Option<AuditLogger>,
}

impl MfaService {
    pub fn new(cipher: SecretCipher, session_gate: SessionGate, config: MfaConfig) -> Self {
        Self {
            cipher,
            session_gate,
            config,
            #[cfg(feature = "audit")]
            audit: None,
        }
    }

    fn drift_steps(&self) -> i64 {
        i64::from(self.config.totp_window)
    }

    fn reverify_ttl(&self) -> Duration {
        self.config.session_verification_ttl()
    }

    #[cfg(feature = "audit")]
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    #[cfg(feature = "audit")]
    async fn emit(&self, kind: AuditEventKind, severity: AuditSeverity, account_id: &str, metadata: serde_json::Value) {
        if let Some(audit) = &self.audit {
            let mut fields = as_object(metadata);
            fields.insert("account_id".to_string(), serde_json::Value::String(account_id.to_string()));
            let event = AuditEvent::new(kind, severity, audit.service_name().to_string())
                .with_metadata(serde_json::Value::Object(fields));
            audit.log(event).await;
        }
    }

    /// Begins enrollment: generates a new secret and a provisioning URI.
    /// The secret is not yet persisted; callers store it (encrypted)
    /// only once [`Self::confirm_enrollment`] succeeds.
    pub fn begin_enrollment(&self, account_id: &str) -> PendingEnrollment {
        let raw_secret = totp::generate_secret();
        let provisioning_uri = totp::provisioning_uri(&self.config.issuer_name, account_id, &raw_secret);
        PendingEnrollment {
            account_id: account_id.to_string(),
            provisioning_uri,
            raw_secret,
        }
    }

    /// Completes enrollment once the first TOTP code verifies. Returns
    /// the plaintext recovery codes (surfaced to the caller exactly
    /// once) alongside the persistable enrollment record.
    pub async fn confirm_enrollment(
        &self,
        pending: PendingEnrollment,
        first_code: &str,
    ) -> Result<(MfaEnrollment, Vec<String>), Error> {
        if !totp::verify_code(&pending.raw_secret, first_code, unix_now(), self.drift_steps())? {
            #[cfg(feature = "audit")]
            self.emit(
                AuditEventKind::MfaVerified,
                AuditSeverity::Warning,
                &pending.account_id,
                serde_json::json!({ "stage": "enrollment", "success": false }),
            )
            .await;
            return Err(Error::Auth("TOTP code did not verify enrollment".to_string()));
        }

        let encrypted_secret = self.cipher.encrypt(&pending.raw_secret)?;
        let (plaintext_codes, recovery_codes) = recovery::generate(Some(self.config.recovery_codes_count));

        #[cfg(feature = "audit")]
        self.emit(
            AuditEventKind::MfaEnrolled,
            AuditSeverity::Notice,
            &pending.account_id,
            serde_json::json!({ "recovery_codes_issued": recovery_codes.len() }),
        )
        .await;

        Ok((
            MfaEnrollment {
                account_id: pending.account_id,
                encrypted_secret,
                recovery_codes,
                enrolled: true,
            },
            plaintext_codes,
        ))
    }

    /// Verifies a TOTP code against a persisted enrollment and, on
    /// success, marks the session verified for `reverify_ttl`.
    pub async fn verify_totp(
        &self,
        enrollment: &MfaEnrollment,
        session_id: &str,
        code: &str,
    ) -> Result<bool, Error> {
        let raw_secret = self.cipher.decrypt(&enrollment.encrypted_secret)?;
        let ok = totp::verify_code(&raw_secret, code, unix_now(), self.drift_steps())?;

        #[cfg(feature = "audit")]
        self.emit(
            AuditEventKind::MfaVerified,
            if ok { AuditSeverity::Informational } else { AuditSeverity::Warning },
            &enrollment.account_id,
            serde_json::json!({ "stage": "login", "success": ok }),
        )
        .await;

        if ok {
            self.session_gate.record_verified(session_id, self.reverify_ttl()).await?;
        }
        Ok(ok)
    }

    /// Verifies and consumes a recovery code. On success, marks the
    /// session verified and returns the count of codes still unused so
    /// callers can prompt regeneration when it runs low.
    pub async fn verify_recovery_code(
        &self,
        enrollment: &mut MfaEnrollment,
        session_id: &str,
        code: &str,
    ) -> Result<(bool, usize), Error> {
        let (matched, remaining) = recovery::verify_and_consume(&mut enrollment.recovery_codes, code);

        #[cfg(feature = "audit")]
        self.emit(
            AuditEventKind::MfaRecoveryCodeUsed,
            AuditSeverity::Notice,
            &enrollment.account_id,
            serde_json::json!({ "success": matched, "codes_remaining": remaining }),
        )
        .await;

        if matched {
            self.session_gate.record_verified(session_id, self.reverify_ttl()).await?;
        }
        Ok((matched, remaining))
    }

    /// Disables MFA for an account, clearing any active session
    /// verification so a stale cache entry can't outlive the enrollment.
    pub async fn disable(&self, enrollment: &MfaEnrollment, session_id: &str) -> Result<(), Error> {
        self.session_gate.clear(session_id).await?;

        #[cfg(feature = "audit")]
        self.emit(
            AuditEventKind::MfaDisabled,
            AuditSeverity::Warning,
            &enrollment.account_id,
            serde_json::json!({}),
        )
        .await;

        Ok(())
    }
}

#[cfg(feature = "audit")]
fn as_object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> MfaService {
        let cipher = SecretCipher::new(&[9u8; 32]).unwrap();
        let cache = crate::cache::DistributedCache::new("mfa-service-test", &CacheConfig::default(), None).unwrap();
        MfaService::new(cipher, SessionGate::new(Arc::new(cache)), MfaConfig::default())
    }

    #[tokio::test]
    async fn enrollment_fails_on_wrong_first_code() {
        let svc = service();
        let pending = svc.begin_enrollment("guest-1");
        let result = svc.confirm_enrollment(pending, "000000").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn enrollment_succeeds_and_issues_ten_recovery_codes() {
        let svc = service();
        let pending = svc.begin_enrollment("guest-2");
        let code = totp::generate_code(&pending.raw_secret, unix_now()).unwrap();

        let (enrollment, codes) = svc.confirm_enrollment(pending, &code).await.unwrap();
        assert!(enrollment.enrolled);
        assert_eq!(codes.len(), 10);
    }

    #[tokio::test]
    async fn verifying_totp_marks_session_verified() {
        let svc = service();
        let pending = svc.begin_enrollment("guest-3");
        let code = totp::generate_code(&pending.raw_secret, unix_now()).unwrap();
        let (enrollment, _codes) = svc.confirm_enrollment(pending, &code).await.unwrap();

        let raw_secret = svc.cipher.decrypt(&enrollment.encrypted_secret).unwrap();
        let login_code = totp::generate_code(&raw_secret, unix_now()).unwrap();

        let ok = svc.verify_totp(&enrollment, "sess-1", &login_code).await.unwrap();
        assert!(ok);
        assert!(svc.session_gate.verified_within("sess-1", Duration::from_secs(300)).await);
    }

    #[tokio::test]
    async fn recovery_code_verification_consumes_it_once() {
        let svc = service();
        let pending = svc.begin_enrollment("guest-4");
        let code = totp::generate_code(&pending.raw_secret, unix_now()).unwrap();
        let (mut enrollment, plaintext_codes) = svc.confirm_enrollment(pending, &code).await.unwrap();

        let (first, remaining) = svc
            .verify_recovery_code(&mut enrollment, "sess-2", &plaintext_codes[0])
            .await
            .unwrap();
        assert!(first);
        assert_eq!(remaining, 9);

        let (second, _) = svc
            .verify_recovery_code(&mut enrollment, "sess-2", &plaintext_codes[0])
            .await
            .unwrap();
        assert!(!second);
    }

    #[tokio::test]
    async fn disabling_clears_session_verification() {
        let svc = service();
        let pending = svc.begin_enrollment("guest-5");
        let code = totp::generate_code(&pending.raw_secret, unix_now()).unwrap();
        let (enrollment, _codes) = svc.confirm_enrollment(pending, &code).await.unwrap();

        svc.session_gate.record_verified("sess-3", Duration::from_secs(300)).await.unwrap();
        svc.disable(&enrollment, "sess-3").await.unwrap();

        assert!(!svc.session_gate.verified_within("sess-3", Duration::from_secs(300)).await);
    }
}
