use axum::{
    extract::{Path, Query, State},
    response::Json,
    Form,
};
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::{bson::doc, Collection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::contact::{ContactMessage, CreateContactMessage};
use crate::models::event::Event;
use crate::models::gallery::{GalleryCategory, GalleryImage};
use crate::models::program::Program;
use crate::models::team::TeamMember;
use crate::state::AppState;

// ========================
// HOME
// ========================

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub programs: Vec<Program>,
    pub team_members: Vec<TeamMember>,
    pub events: Vec<Event>,
    pub gallery_images: Vec<GalleryImage>,
}

pub async fn home(State(state): State<AppState>) -> Result<Json<HomeResponse>> {
    let programs: Vec<Program> = state
        .db
        .collection::<Program>("programs")
        .find(doc! { "is_active": true })
        .sort(doc! { "created_at": -1 })
        .limit(3)
        .await?
        .try_collect()
        .await?;

    let team_members: Vec<TeamMember> = state
        .db
        .collection::<TeamMember>("team_members")
        .find(doc! { "is_active": true })
        .sort(doc! { "display_order": 1 })
        .limit(4)
        .await?
        .try_collect()
        .await?;

    // Soonest events first on the homepage
    let events: Vec<Event> = state
        .db
        .collection::<Event>("events")
        .find(doc! { "is_active": true })
        .sort(doc! { "date": 1 })
        .limit(3)
        .await?
        .try_collect()
        .await?;

    let gallery_images: Vec<GalleryImage> = state
        .db
        .collection::<GalleryImage>("gallery_images")
        .find(doc! {})
        .sort(doc! { "created_at": -1 })
        .limit(6)
        .await?
        .try_collect()
        .await?;

    Ok(Json(HomeResponse {
        programs,
        team_members,
        events,
        gallery_images,
    }))
}

// ========================
// PROGRAMS
// ========================

pub async fn list_programs(State(state): State<AppState>) -> Result<Json<Vec<Program>>> {
    let programs: Vec<Program> = state
        .db
        .collection::<Program>("programs")
        .find(doc! { "is_active": true })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    Ok(Json(programs))
}

#[derive(Debug, Serialize)]
pub struct ProgramDetailResponse {
    pub program: Program,
    pub related_programs: Vec<Program>,
}

pub async fn program_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProgramDetailResponse>> {
    let collection: Collection<Program> = state.db.collection("programs");

    let program = collection
        .find_one(doc! { "slug": &slug, "is_active": true })
        .await?
        .ok_or(AppError::DocumentNotFound)?;

    let related_programs: Vec<Program> = collection
        .find(doc! { "is_active": true, "slug": { "$ne": &slug } })
        .sort(doc! { "created_at": -1 })
        .limit(3)
        .await?
        .try_collect()
        .await?;

    Ok(Json(ProgramDetailResponse {
        program,
        related_programs,
    }))
}

// ========================
// EVENTS
// ========================

pub async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>> {
    let events: Vec<Event> = state
        .db
        .collection::<Event>("events")
        .find(doc! { "is_active": true })
        .sort(doc! { "date": -1 })
        .await?
        .try_collect()
        .await?;

    Ok(Json(events))
}

// ========================
// GALLERY
// ========================

#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GalleryResponse {
    pub categories: Vec<GalleryCategory>,
    pub images: Vec<GalleryImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_category: Option<String>,
}

pub async fn gallery(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> Result<Json<GalleryResponse>> {
    let categories_coll: Collection<GalleryCategory> = state.db.collection("gallery_categories");
    let images_coll: Collection<GalleryImage> = state.db.collection("gallery_images");

    let categories: Vec<GalleryCategory> = categories_coll
        .find(doc! {})
        .sort(doc! { "name": 1 })
        .await?
        .try_collect()
        .await?;

    let filter = match &query.category {
        Some(name) => {
            // Unknown category names yield an empty gallery, not an error
            match categories_coll.find_one(doc! { "name": name }).await? {
                Some(category) => match category.id {
                    Some(id) => doc! { "category_id": id },
                    None => return Ok(Json(GalleryResponse {
                        categories,
                        images: Vec::new(),
                        selected_category: query.category.clone(),
                    })),
                },
                None => {
                    return Ok(Json(GalleryResponse {
                        categories,
                        images: Vec::new(),
                        selected_category: query.category.clone(),
                    }))
                }
            }
        }
        None => doc! {},
    };

    let images: Vec<GalleryImage> = images_coll
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    Ok(Json(GalleryResponse {
        categories,
        images,
        selected_category: query.category,
    }))
}

pub async fn gallery_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<GalleryCategory>>> {
    let categories: Vec<GalleryCategory> = state
        .db
        .collection::<GalleryCategory>("gallery_categories")
        .find(doc! {})
        .sort(doc! { "name": 1 })
        .await?
        .try_collect()
        .await?;

    Ok(Json(categories))
}

// ========================
// TEAM
// ========================

pub async fn list_team(State(state): State<AppState>) -> Result<Json<Vec<TeamMember>>> {
    let team: Vec<TeamMember> = state
        .db
        .collection::<TeamMember>("team_members")
        .find(doc! { "is_active": true })
        .sort(doc! { "display_order": 1 })
        .await?
        .try_collect()
        .await?;

    Ok(Json(team))
}

// ========================
// CONTACT
// ========================

pub async fn submit_contact(
    State(state): State<AppState>,
    Form(payload): Form<CreateContactMessage>,
) -> Result<Json<Value>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let message = ContactMessage {
        id: None,
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_string(),
        subject: payload.subject.trim().to_string(),
        message: payload.message.trim().to_string(),
        created_at: Utc::now(),
        is_read: false,
    };

    state
        .db
        .collection::<ContactMessage>("contact_messages")
        .insert_one(&message)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Your message has been sent. Thank you for contacting us!",
    })))
}
