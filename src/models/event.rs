use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub title: String,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,

    pub location: String,
    pub description: String,
    pub image: String,
    pub is_active: bool,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

pub mod attendance_status {
    pub const REGISTERED: &str = "registered";
    pub const CANCELLED: &str = "cancelled";
    pub const ATTENDED: &str = "attended";
}

/// One member's registration for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAttendance {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub member_id: ObjectId,
    pub event_id: ObjectId,
    pub status: String,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EventHistoryEntry {
    pub event: Event,
    pub status: String,
    pub registered_at: String,
}
