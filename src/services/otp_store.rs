use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime},
    options::ReturnDocument,
    Collection, Database,
};

use crate::errors::{AppError, Result};
use crate::models::otp::OtpVerification;

/// Persistence seam for OTP records. The service layer only ever touches
/// records through this trait, which keeps the verification state machine
/// runnable against an in-memory store in tests.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Delete every unverified record for an email. Returns the count.
    async fn delete_unverified(&self, email: &str) -> Result<u64>;

    /// Persist a new record, returning it with its assigned id.
    async fn insert(&self, record: OtpVerification) -> Result<OtpVerification>;

    /// Most recently created record for an email, any verification state.
    async fn latest_for_email(&self, email: &str) -> Result<Option<OtpVerification>>;

    /// Atomically bump the attempt counter, returning the updated value.
    async fn increment_attempts(&self, id: &ObjectId) -> Result<i32>;

    async fn mark_verified(&self, id: &ObjectId) -> Result<()>;

    /// Delete all records whose expiry is older than `cutoff`.
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

pub struct MongoOtpStore {
    collection: Collection<OtpVerification>,
}

impl MongoOtpStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("otp_verifications"),
        }
    }
}

#[async_trait]
impl OtpStore for MongoOtpStore {
    async fn delete_unverified(&self, email: &str) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "email": email, "is_verified": false })
            .await?;
        Ok(result.deleted_count)
    }

    async fn insert(&self, mut record: OtpVerification) -> Result<OtpVerification> {
        let result = self.collection.insert_one(&record).await?;
        record.id = result.inserted_id.as_object_id();
        Ok(record)
    }

    async fn latest_for_email(&self, email: &str) -> Result<Option<OtpVerification>> {
        let record = self
            .collection
            .find_one(doc! { "email": email })
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(record)
    }

    async fn increment_attempts(&self, id: &ObjectId) -> Result<i32> {
        // Single atomic $inc so two racing verifies observe distinct values.
        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": id }, doc! { "$inc": { "attempts": 1 } })
            .return_document(ReturnDocument::After)
            .await?
            .ok_or(AppError::DocumentNotFound)?;
        Ok(updated.attempts)
    }

    async fn mark_verified(&self, id: &ObjectId) -> Result<()> {
        self.collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "is_verified": true } })
            .await?;
        Ok(())
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "expires_at": { "$lt": BsonDateTime::from_chrono(cutoff) } })
            .await?;
        Ok(result.deleted_count)
    }
}
