use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};
use crate::models::otp::{
    OtpVerification, OTP_LENGTH, OTP_MAX_ATTEMPTS, OTP_RESEND_COOLDOWN_SECONDS,
    OTP_SWEEP_GRACE_HOURS, OTP_TTL_MINUTES,
};
use crate::services::email_service::Mailer;
use crate::services::otp_store::OtpStore;

const VERIFICATION_TOKEN_PURPOSE: &str = "email_verification";
const VERIFICATION_TOKEN_TTL_MINUTES: i64 = 60;

/// Claims binding a verified email to the registration that consumes it.
#[derive(Debug, Serialize, Deserialize)]
struct VerificationClaims {
    email: String,
    purpose: String,
    exp: usize,
}

/// Result of a verification attempt. The check order in [`OtpService::verify`]
/// decides which of these a caller sees under compound conditions, and the
/// messages are part of the user-facing contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Success,
    NotFound,
    Expired,
    AlreadyUsed,
    TooManyAttempts,
    Mismatch { remaining: i32 },
}

impl VerifyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VerifyOutcome::Success)
    }

    pub fn message(&self) -> String {
        match self {
            VerifyOutcome::Success => "Email verified successfully!".to_string(),
            VerifyOutcome::NotFound => {
                "No OTP found for this email. Please request a new one.".to_string()
            }
            VerifyOutcome::Expired => "OTP has expired. Please request a new one.".to_string(),
            VerifyOutcome::AlreadyUsed => "This OTP has already been used.".to_string(),
            VerifyOutcome::TooManyAttempts => {
                "Too many failed attempts. Please request a new OTP.".to_string()
            }
            VerifyOutcome::Mismatch { remaining } => {
                format!("Invalid OTP. Attempts remaining: {}", remaining)
            }
        }
    }
}

#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    mailer: Arc<dyn Mailer>,
    site_name: String,
    jwt_secret: String,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        mailer: Arc<dyn Mailer>,
        site_name: String,
        jwt_secret: String,
    ) -> Self {
        Self {
            store,
            mailer,
            site_name,
            jwt_secret,
        }
    }

    /// Generate a random numeric code of `length` decimal digits.
    pub fn generate_code(length: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| (b'0' + rng.gen_range(0..10u8)) as char)
            .collect()
    }

    /// Issue a fresh code for `email`: drop any unverified predecessors,
    /// persist the new record, then dispatch it by email. Persistence happens
    /// before dispatch, so a failed send leaves a valid record behind.
    pub async fn issue(&self, email: &str) -> Result<OtpVerification> {
        let email = email.trim();

        self.store.delete_unverified(email).await?;

        let code = Self::generate_code(OTP_LENGTH);
        let record = self.store.insert(OtpVerification::new(email, code)).await?;

        let (subject, text, html) = self.render_verification_email(&record.code);
        self.mailer
            .send(email, &subject, &text, Some(html))
            .await
            .map_err(|e| match e {
                AppError::EmailDispatch(_) => e,
                other => AppError::EmailDispatch(other.to_string()),
            })?;

        Ok(record)
    }

    /// Check a submitted code against the newest record for `email`.
    ///
    /// The order matters: expiry and already-used are checked before the
    /// attempt counter moves, so neither consumes the attempt budget. Every
    /// live attempt after that point counts, including the successful one.
    pub async fn verify(&self, email: &str, submitted_code: &str) -> Result<VerifyOutcome> {
        let email = email.trim();

        let record = match self.store.latest_for_email(email).await? {
            Some(record) => record,
            None => return Ok(VerifyOutcome::NotFound),
        };

        if record.is_expired() {
            return Ok(VerifyOutcome::Expired);
        }

        if record.is_verified {
            return Ok(VerifyOutcome::AlreadyUsed);
        }

        let id = record.id.ok_or(AppError::DocumentNotFound)?;
        let attempts = self.store.increment_attempts(&id).await?;

        if attempts > OTP_MAX_ATTEMPTS {
            return Ok(VerifyOutcome::TooManyAttempts);
        }

        if record.code != submitted_code.trim() {
            return Ok(VerifyOutcome::Mismatch {
                remaining: OTP_MAX_ATTEMPTS - attempts,
            });
        }

        self.store.mark_verified(&id).await?;
        Ok(VerifyOutcome::Success)
    }

    /// Resend gate: a new code may be requested once the newest record for
    /// `email` is older than the cooldown. No history means no restriction.
    pub async fn can_resend(&self, email: &str) -> Result<bool> {
        match self.store.latest_for_email(email.trim()).await? {
            Some(record) => {
                Ok(Utc::now() - record.created_at >= Duration::seconds(OTP_RESEND_COOLDOWN_SECONDS))
            }
            None => Ok(true),
        }
    }

    /// Garbage-collect records that expired more than the grace period ago.
    /// Returns the number of deleted records.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::hours(OTP_SWEEP_GRACE_HOURS);
        self.store.delete_expired_before(cutoff).await
    }

    /// Short-lived signed token proving that `email` passed verification.
    /// Registration requires it and checks the email claim.
    pub fn generate_verification_token(&self, email: &str) -> Result<String> {
        let expiration = Utc::now()
            .checked_add_signed(Duration::minutes(VERIFICATION_TOKEN_TTL_MINUTES))
            .ok_or_else(|| AppError::configuration("Failed to calculate token expiration"))?
            .timestamp() as usize;

        let claims = VerificationClaims {
            email: email.trim().to_string(),
            purpose: VERIFICATION_TOKEN_PURPOSE.to_string(),
            exp: expiration,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::configuration(format!("Token generation failed: {}", e)))
    }

    /// Decode a verification token, returning the verified email. Invalid,
    /// expired, or wrong-purpose tokens are all rejected alike.
    pub fn decode_verification_token(&self, token: &str) -> Result<String> {
        let data = decode::<VerificationClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| AppError::AuthError)?;

        if data.claims.purpose != VERIFICATION_TOKEN_PURPOSE {
            return Err(AppError::AuthError);
        }

        Ok(data.claims.email)
    }

    fn render_verification_email(&self, code: &str) -> (String, String, String) {
        let subject = format!("{} - Email Verification OTP", self.site_name);

        let text = format!(
            "Hello,\n\n\
             Your OTP for email verification is: {code}\n\n\
             This OTP will expire in {ttl} minutes.\n\n\
             If you didn't request this, please ignore this email.\n\n\
             Best regards,\n\
             {site} Team\n",
            code = code,
            ttl = OTP_TTL_MINUTES,
            site = self.site_name,
        );

        let html = format!(
            "<p>Hello,</p>\
             <p>Your OTP for email verification is:</p>\
             <p style=\"font-size:24px;font-weight:bold;letter-spacing:4px;\">{code}</p>\
             <p>This OTP will expire in {ttl} minutes.</p>\
             <p>If you didn't request this, please ignore this email.</p>\
             <p>Best regards,<br>{site} Team</p>",
            code = code,
            ttl = OTP_TTL_MINUTES,
            site = self.site_name,
        );

        (subject, text, html)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;
    use mongodb::bson::oid::ObjectId;

    use super::*;

    #[derive(Default)]
    struct MemoryOtpStore {
        records: Mutex<Vec<OtpVerification>>,
    }

    impl MemoryOtpStore {
        fn push(&self, mut record: OtpVerification) -> OtpVerification {
            record.id = Some(ObjectId::new());
            self.records.lock().unwrap().push(record.clone());
            record
        }

        fn all_for(&self, email: &str) -> Vec<OtpVerification> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.email == email)
                .cloned()
                .collect()
        }

        fn latest(&self, email: &str) -> OtpVerification {
            self.all_for(email)
                .into_iter()
                .max_by_key(|r| r.created_at)
                .expect("no record for email")
        }

        /// Simulate `elapsed` wall-clock time passing for every record of
        /// `email` by shifting their timestamps into the past.
        fn advance_time(&self, email: &str, elapsed: Duration) {
            for record in self
                .records
                .lock()
                .unwrap()
                .iter_mut()
                .filter(|r| r.email == email)
            {
                record.created_at -= elapsed;
                record.expires_at -= elapsed;
            }
        }
    }

    #[async_trait]
    impl OtpStore for MemoryOtpStore {
        async fn delete_unverified(&self, email: &str) -> Result<u64> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| !(r.email == email && !r.is_verified));
            Ok((before - records.len()) as u64)
        }

        async fn insert(&self, record: OtpVerification) -> Result<OtpVerification> {
            Ok(self.push(record))
        }

        async fn latest_for_email(&self, email: &str) -> Result<Option<OtpVerification>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.email == email)
                .max_by_key(|r| r.created_at)
                .cloned())
        }

        async fn increment_attempts(&self, id: &ObjectId) -> Result<i32> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.id.as_ref() == Some(id))
                .ok_or(AppError::DocumentNotFound)?;
            record.attempts += 1;
            Ok(record.attempts)
        }

        async fn mark_verified(&self, id: &ObjectId) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.id.as_ref() == Some(id))
                .ok_or(AppError::DocumentNotFound)?;
            record.is_verified = true;
            Ok(())
        }

        async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| r.expires_at >= cutoff);
            Ok((before - records.len()) as u64)
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, String, Option<String>)>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(
            &self,
            to: &str,
            subject: &str,
            text_body: &str,
            html_body: Option<String>,
        ) -> Result<()> {
            if self.fail {
                return Err(AppError::dispatch("SMTP unavailable"));
            }
            self.sent.lock().unwrap().push((
                to.to_string(),
                subject.to_string(),
                text_body.to_string(),
                html_body,
            ));
            Ok(())
        }
    }

    fn service() -> (OtpService, Arc<MemoryOtpStore>, Arc<RecordingMailer>) {
        service_with_mailer(false)
    }

    fn service_with_mailer(fail: bool) -> (OtpService, Arc<MemoryOtpStore>, Arc<RecordingMailer>) {
        let store = Arc::new(MemoryOtpStore::default());
        let mailer = Arc::new(RecordingMailer {
            fail,
            ..Default::default()
        });
        let svc = OtpService::new(
            store.clone(),
            mailer.clone(),
            "Shanti Yuwa Club".to_string(),
            "test-secret".to_string(),
        );
        (svc, store, mailer)
    }

    fn wrong_code_for(code: &str) -> String {
        if code == "000000" {
            "111111".to_string()
        } else {
            "000000".to_string()
        }
    }

    #[test]
    fn generated_codes_are_fixed_length_digits() {
        for _ in 0..50 {
            let code = OtpService::generate_code(OTP_LENGTH);
            assert_eq!(code.len(), OTP_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        assert_eq!(OtpService::generate_code(4).len(), 4);
    }

    #[tokio::test]
    async fn issue_persists_record_then_dispatches_email() {
        let (svc, store, mailer) = service();

        let record = svc.issue("a@b.com").await.unwrap();
        assert_eq!(record.email, "a@b.com");
        assert_eq!(record.code.len(), OTP_LENGTH);
        assert_eq!(record.attempts, 0);
        assert!(!record.is_verified);
        assert_eq!(
            record.expires_at - record.created_at,
            Duration::minutes(OTP_TTL_MINUTES)
        );
        assert!(record.id.is_some());
        assert_eq!(store.all_for("a@b.com").len(), 1);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (to, subject, text, html) = &sent[0];
        assert_eq!(to, "a@b.com");
        assert_eq!(subject, "Shanti Yuwa Club - Email Verification OTP");
        assert!(text.contains(&record.code));
        assert!(text.contains("expire in 10 minutes"));
        assert!(html.as_ref().unwrap().contains(&record.code));
    }

    #[tokio::test]
    async fn issue_replaces_prior_unverified_record() {
        let (svc, store, _) = service();

        svc.issue("a@b.com").await.unwrap();
        let second = svc.issue("a@b.com").await.unwrap();

        let records = store.all_for("a@b.com");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, second.code);
    }

    #[tokio::test]
    async fn issue_retains_verified_history() {
        let (svc, store, _) = service();

        let first = svc.issue("a@b.com").await.unwrap();
        svc.verify("a@b.com", &first.code).await.unwrap();
        store.advance_time("a@b.com", Duration::seconds(90));
        svc.issue("a@b.com").await.unwrap();

        // The verified record survives as history; only one unverified exists.
        let records = store.all_for("a@b.com");
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().filter(|r| !r.is_verified).count(), 1);
    }

    #[tokio::test]
    async fn verify_success_then_already_used() {
        let (svc, store, _) = service();
        let record = svc.issue("a@b.com").await.unwrap();

        let outcome = svc.verify("a@b.com", &record.code).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Success);
        assert_eq!(outcome.message(), "Email verified successfully!");

        let stored = store.latest("a@b.com");
        assert!(stored.is_verified);
        assert_eq!(stored.attempts, 1);

        let again = svc.verify("a@b.com", &record.code).await.unwrap();
        assert_eq!(again, VerifyOutcome::AlreadyUsed);
        // Already-used checks happen before the counter moves.
        assert_eq!(store.latest("a@b.com").attempts, 1);
    }

    #[tokio::test]
    async fn verify_without_issuance_reports_not_found() {
        let (svc, _, _) = service();
        let outcome = svc.verify("nobody@b.com", "123456").await.unwrap();
        assert_eq!(outcome, VerifyOutcome::NotFound);
        assert_eq!(
            outcome.message(),
            "No OTP found for this email. Please request a new one."
        );
    }

    #[tokio::test]
    async fn wrong_codes_consume_the_attempt_budget() {
        let (svc, store, _) = service();
        let record = svc.issue("a@b.com").await.unwrap();
        let wrong = wrong_code_for(&record.code);

        for expected_remaining in [4, 3, 2, 1, 0] {
            let outcome = svc.verify("a@b.com", &wrong).await.unwrap();
            assert_eq!(
                outcome,
                VerifyOutcome::Mismatch {
                    remaining: expected_remaining
                }
            );
            assert_eq!(
                outcome.message(),
                format!("Invalid OTP. Attempts remaining: {}", expected_remaining)
            );
        }

        // Budget exhausted: even the correct code is now rejected.
        let outcome = svc.verify("a@b.com", &record.code).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::TooManyAttempts);
        assert_eq!(store.latest("a@b.com").attempts, 6);
    }

    #[tokio::test]
    async fn expired_code_rejected_without_attempt_increment() {
        let (svc, store, _) = service();
        let record = svc.issue("a@b.com").await.unwrap();

        store.advance_time("a@b.com", Duration::minutes(OTP_TTL_MINUTES + 1));

        let outcome = svc.verify("a@b.com", &record.code).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Expired);
        assert_eq!(store.latest("a@b.com").attempts, 0);
    }

    #[tokio::test]
    async fn expiry_takes_precedence_over_attempt_budget() {
        let (svc, store, _) = service();
        let record = svc.issue("a@b.com").await.unwrap();
        let wrong = wrong_code_for(&record.code);

        for _ in 0..6 {
            svc.verify("a@b.com", &wrong).await.unwrap();
        }
        assert_eq!(
            svc.verify("a@b.com", &wrong).await.unwrap(),
            VerifyOutcome::TooManyAttempts
        );

        store.advance_time("a@b.com", Duration::minutes(OTP_TTL_MINUTES + 1));

        // An expired, over-attempted code reports Expired, not TooManyAttempts.
        assert_eq!(
            svc.verify("a@b.com", &record.code).await.unwrap(),
            VerifyOutcome::Expired
        );
    }

    #[tokio::test]
    async fn email_and_code_are_trimmed() {
        let (svc, store, _) = service();
        let record = svc.issue("  a@b.com  ").await.unwrap();
        assert_eq!(record.email, "a@b.com");
        assert_eq!(store.all_for("a@b.com").len(), 1);

        let submitted = format!("  {} \n", record.code);
        assert_eq!(
            svc.verify("a@b.com", &submitted).await.unwrap(),
            VerifyOutcome::Success
        );
    }

    #[tokio::test]
    async fn resend_is_unrestricted_without_history() {
        let (svc, _, _) = service();
        assert!(svc.can_resend("new@b.com").await.unwrap());
    }

    #[tokio::test]
    async fn resend_denied_inside_cooldown_then_allowed() {
        let (svc, store, _) = service();
        svc.issue("a@b.com").await.unwrap();

        assert!(!svc.can_resend("a@b.com").await.unwrap());

        store.advance_time("a@b.com", Duration::seconds(OTP_RESEND_COOLDOWN_SECONDS + 1));
        assert!(svc.can_resend("a@b.com").await.unwrap());
    }

    #[tokio::test]
    async fn dispatch_failure_reports_error_but_keeps_record() {
        let (svc, store, _) = service_with_mailer(true);

        let err = svc.issue("a@b.com").await.unwrap_err();
        assert!(matches!(err, AppError::EmailDispatch(_)));

        // Persistence happens before dispatch.
        assert_eq!(store.all_for("a@b.com").len(), 1);
    }

    #[tokio::test]
    async fn sweep_deletes_only_long_expired_records() {
        let (svc, store, _) = service();
        let now = Utc::now();

        let mut stale = OtpVerification::new("old@b.com", "111111");
        stale.created_at = now - Duration::hours(2) - Duration::minutes(OTP_TTL_MINUTES);
        stale.expires_at = now - Duration::hours(2);
        store.push(stale);

        let mut recent = OtpVerification::new("recent@b.com", "222222");
        recent.created_at = now - Duration::minutes(30 + OTP_TTL_MINUTES);
        recent.expires_at = now - Duration::minutes(30);
        store.push(recent);

        assert_eq!(svc.sweep_expired().await.unwrap(), 1);
        assert!(store.all_for("old@b.com").is_empty());
        assert_eq!(store.all_for("recent@b.com").len(), 1);
    }

    #[tokio::test]
    async fn verification_token_roundtrip_and_rejection() {
        let (svc, _, _) = service();

        let token = svc.generate_verification_token("a@b.com").unwrap();
        assert_eq!(svc.decode_verification_token(&token).unwrap(), "a@b.com");

        assert!(svc.decode_verification_token("not-a-token").is_err());

        // Same secret, wrong purpose.
        let foreign = encode(
            &Header::default(),
            &VerificationClaims {
                email: "a@b.com".to_string(),
                purpose: "password_reset".to_string(),
                exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
            },
            &EncodingKey::from_secret("test-secret".as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            svc.decode_verification_token(&foreign),
            Err(AppError::AuthError)
        ));
    }

    #[tokio::test]
    async fn reissue_after_expiry_scenario() {
        let (svc, store, _) = service();

        // T=0: issue.
        let first = svc.issue("a@b.com").await.unwrap();
        let wrong = wrong_code_for(&first.code);

        // T=5m: one wrong attempt.
        store.advance_time("a@b.com", Duration::minutes(5));
        assert_eq!(
            svc.verify("a@b.com", &wrong).await.unwrap(),
            VerifyOutcome::Mismatch { remaining: 4 }
        );

        // T=11m: the correct code has expired.
        store.advance_time("a@b.com", Duration::minutes(6));
        assert_eq!(
            svc.verify("a@b.com", &first.code).await.unwrap(),
            VerifyOutcome::Expired
        );

        // Re-issue and verify the fresh code.
        let second = svc.issue("a@b.com").await.unwrap();
        assert_eq!(
            svc.verify("a@b.com", &second.code).await.unwrap(),
            VerifyOutcome::Success
        );
    }
}
