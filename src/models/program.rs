use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub title: String,
    pub slug: String,
    pub short_description: String,
    pub content: String,
    pub image: String,
    pub is_active: bool,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

pub mod participation_status {
    pub const ACTIVE: &str = "active";
    pub const COMPLETED: &str = "completed";
    pub const DROPPED: &str = "dropped";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramParticipation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub member_id: ObjectId,
    pub program_id: ObjectId,
    pub status: String,
    pub role: String,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProgramHistoryEntry {
    pub program: Program,
    pub status: String,
    pub role: String,
    pub enrolled_at: String,
}
