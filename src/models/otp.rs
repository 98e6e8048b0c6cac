use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Length of generated verification codes.
pub const OTP_LENGTH: usize = 6;

/// Minutes a code stays valid after issuance.
pub const OTP_TTL_MINUTES: i64 = 10;

/// Maximum verification attempts against a single code.
pub const OTP_MAX_ATTEMPTS: i32 = 5;

/// Seconds a caller must wait between resend requests for the same email.
pub const OTP_RESEND_COOLDOWN_SECONDS: i64 = 60;

/// Hours past expiry before a record becomes sweepable.
pub const OTP_SWEEP_GRACE_HOURS: i64 = 1;

/// One issuance of an email verification code. History is retained per
/// email; only the newest unverified record is ever reachable by the
/// verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub email: String,

    pub code: String,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,

    pub is_verified: bool,

    pub attempts: i32,
}

impl OtpVerification {
    pub fn new(email: impl Into<String>, code: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            email: email.into(),
            code: code.into(),
            created_at: now,
            expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
            is_verified: false,
            attempts: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_unverified_with_ttl() {
        let record = OtpVerification::new("a@b.com", "123456");
        assert!(!record.is_verified);
        assert_eq!(record.attempts, 0);
        assert_eq!(
            record.expires_at - record.created_at,
            Duration::minutes(OTP_TTL_MINUTES)
        );
        assert!(!record.is_expired());
    }

    #[test]
    fn backdated_record_is_expired() {
        let mut record = OtpVerification::new("a@b.com", "123456");
        record.expires_at = Utc::now() - Duration::seconds(1);
        assert!(record.is_expired());
    }
}
