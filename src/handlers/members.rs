use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime},
    Collection,
};
use serde::Serialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::dtos::auth_dtos::UpdateProfileRequest;
use crate::errors::{AppError, Result};
use crate::models::event::{attendance_status, Event, EventAttendance, EventHistoryEntry};
use crate::models::member::{Claims, Member, MemberResponse};
use crate::models::program::{
    participation_status, Program, ProgramHistoryEntry, ProgramParticipation,
};
use crate::state::AppState;

async fn current_member(state: &AppState, claims: &Claims) -> Result<Member> {
    let id = ObjectId::parse_str(&claims.sub)?;
    let collection: Collection<Member> = state.db.collection("members");
    collection
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(AppError::DocumentNotFound)
}

// ========================
// PROFILE
// ========================

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MemberResponse>> {
    let member = current_member(&state, &claims).await?;
    Ok(Json(member.to_response()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<MemberResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let member = current_member(&state, &claims).await?;
    let member_id = member.id.ok_or(AppError::DocumentNotFound)?;

    let collection: Collection<Member> = state.db.collection("members");
    collection
        .update_one(
            doc! { "_id": member_id },
            doc! { "$set": {
                "first_name": payload.first_name.trim(),
                "last_name": payload.last_name.trim(),
                "phone": payload.phone.as_deref(),
                "bio": payload.bio.as_deref(),
                "updated_at": BsonDateTime::from_chrono(Utc::now()),
            }},
        )
        .await?;

    let updated = current_member(&state, &claims).await?;
    Ok(Json(updated.to_response()))
}

// ========================
// DASHBOARD
// ========================

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_events_attended: u64,
    pub total_programs: u64,
    pub upcoming_events: usize,
    pub active_programs: usize,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub member: MemberResponse,
    pub upcoming_events: Vec<Event>,
    pub active_programs: Vec<Program>,
    pub recent_events: Vec<Event>,
    pub stats: DashboardStats,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DashboardResponse>> {
    let member = current_member(&state, &claims).await?;
    let member_id = member.id.ok_or(AppError::DocumentNotFound)?;

    let attendance: Collection<EventAttendance> = state.db.collection("event_attendance");
    let events: Collection<Event> = state.db.collection("events");
    let participation: Collection<ProgramParticipation> =
        state.db.collection("program_participation");
    let programs: Collection<Program> = state.db.collection("programs");

    let now = BsonDateTime::from_chrono(Utc::now());

    // Upcoming events the member registered for
    let registered: Vec<EventAttendance> = attendance
        .find(doc! { "member_id": member_id, "status": attendance_status::REGISTERED })
        .await?
        .try_collect()
        .await?;
    let registered_ids: Vec<ObjectId> = registered.iter().map(|a| a.event_id).collect();
    let upcoming_events: Vec<Event> = events
        .find(doc! { "_id": { "$in": registered_ids }, "date": { "$gte": now } })
        .sort(doc! { "date": 1 })
        .limit(5)
        .await?
        .try_collect()
        .await?;

    // Active program participations
    let active: Vec<ProgramParticipation> = participation
        .find(doc! { "member_id": member_id, "status": participation_status::ACTIVE })
        .await?
        .try_collect()
        .await?;
    let active_ids: Vec<ObjectId> = active.iter().map(|p| p.program_id).collect();
    let active_programs: Vec<Program> = programs
        .find(doc! { "_id": { "$in": active_ids } })
        .limit(5)
        .await?
        .try_collect()
        .await?;

    // Recent activity: last attended events
    let attended: Vec<EventAttendance> = attendance
        .find(doc! { "member_id": member_id, "status": attendance_status::ATTENDED })
        .await?
        .try_collect()
        .await?;
    let attended_ids: Vec<ObjectId> = attended.iter().map(|a| a.event_id).collect();
    let recent_events: Vec<Event> = events
        .find(doc! { "_id": { "$in": attended_ids } })
        .sort(doc! { "date": -1 })
        .limit(5)
        .await?
        .try_collect()
        .await?;

    let stats = DashboardStats {
        total_events_attended: attended.len() as u64,
        total_programs: participation
            .count_documents(doc! { "member_id": member_id })
            .await?,
        upcoming_events: upcoming_events.len(),
        active_programs: active_programs.len(),
    };

    Ok(Json(DashboardResponse {
        member: member.to_response(),
        upcoming_events,
        active_programs,
        recent_events,
        stats,
    }))
}

// ========================
// EVENTS
// ========================

#[derive(Debug, Serialize)]
pub struct MemberEventsResponse {
    pub upcoming_events: Vec<Event>,
    pub registered_event_ids: Vec<String>,
    pub event_history: Vec<EventHistoryEntry>,
}

pub async fn member_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MemberEventsResponse>> {
    let member = current_member(&state, &claims).await?;
    let member_id = member.id.ok_or(AppError::DocumentNotFound)?;

    let events: Collection<Event> = state.db.collection("events");
    let attendance: Collection<EventAttendance> = state.db.collection("event_attendance");

    let now = BsonDateTime::from_chrono(Utc::now());
    let upcoming_events: Vec<Event> = events
        .find(doc! { "is_active": true, "date": { "$gte": now } })
        .sort(doc! { "date": 1 })
        .await?
        .try_collect()
        .await?;

    let registrations: Vec<EventAttendance> = attendance
        .find(doc! { "member_id": member_id })
        .await?
        .try_collect()
        .await?;
    let registered_event_ids: Vec<String> =
        registrations.iter().map(|a| a.event_id.to_hex()).collect();

    let history_ids: Vec<ObjectId> = registrations.iter().map(|a| a.event_id).collect();
    let by_event: HashMap<ObjectId, &EventAttendance> =
        registrations.iter().map(|a| (a.event_id, a)).collect();

    let history_events: Vec<Event> = events
        .find(doc! { "_id": { "$in": history_ids } })
        .sort(doc! { "date": -1 })
        .await?
        .try_collect()
        .await?;
    let event_history: Vec<EventHistoryEntry> = history_events
        .into_iter()
        .filter_map(|event| {
            let entry = event.id.and_then(|id| by_event.get(&id))?;
            Some(EventHistoryEntry {
                status: entry.status.clone(),
                registered_at: entry.registered_at.to_rfc3339(),
                event,
            })
        })
        .collect();

    Ok(Json(MemberEventsResponse {
        upcoming_events,
        registered_event_ids,
        event_history,
    }))
}

pub async fn register_for_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<String>,
) -> Result<Json<Value>> {
    let member = current_member(&state, &claims).await?;
    let member_id = member.id.ok_or(AppError::DocumentNotFound)?;
    let event_oid = ObjectId::parse_str(&event_id)?;

    let events: Collection<Event> = state.db.collection("events");
    let event = events
        .find_one(doc! { "_id": event_oid, "is_active": true })
        .await?
        .ok_or(AppError::DocumentNotFound)?;

    let attendance: Collection<EventAttendance> = state.db.collection("event_attendance");
    let existing = attendance
        .find_one(doc! { "member_id": member_id, "event_id": event_oid })
        .await?;
    if existing.is_some() {
        return Ok(Json(json!({
            "success": true,
            "message": format!("You are already registered for \"{}\".", event.title),
        })));
    }

    attendance
        .insert_one(&EventAttendance {
            id: None,
            member_id,
            event_id: event_oid,
            status: attendance_status::REGISTERED.to_string(),
            registered_at: Utc::now(),
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("You have successfully registered for \"{}\"!", event.title),
    })))
}

pub async fn cancel_event_registration(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<String>,
) -> Result<Json<Value>> {
    let member = current_member(&state, &claims).await?;
    let member_id = member.id.ok_or(AppError::DocumentNotFound)?;
    let event_oid = ObjectId::parse_str(&event_id)?;

    let attendance: Collection<EventAttendance> = state.db.collection("event_attendance");
    let result = attendance
        .update_one(
            doc! { "member_id": member_id, "event_id": event_oid },
            doc! { "$set": { "status": attendance_status::CANCELLED } },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::DocumentNotFound);
    }

    Ok(Json(json!({
        "success": true,
        "message": "Your registration has been cancelled.",
    })))
}

// ========================
// PROGRAMS
// ========================

#[derive(Debug, Serialize)]
pub struct MemberProgramsResponse {
    pub all_programs: Vec<Program>,
    pub enrolled_program_ids: Vec<String>,
    pub program_history: Vec<ProgramHistoryEntry>,
}

pub async fn member_programs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MemberProgramsResponse>> {
    let member = current_member(&state, &claims).await?;
    let member_id = member.id.ok_or(AppError::DocumentNotFound)?;

    let programs: Collection<Program> = state.db.collection("programs");
    let participation: Collection<ProgramParticipation> =
        state.db.collection("program_participation");

    let all_programs: Vec<Program> = programs
        .find(doc! { "is_active": true })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    let participations: Vec<ProgramParticipation> = participation
        .find(doc! { "member_id": member_id })
        .sort(doc! { "enrolled_at": -1 })
        .await?
        .try_collect()
        .await?;
    let enrolled_program_ids: Vec<String> =
        participations.iter().map(|p| p.program_id.to_hex()).collect();

    let history_ids: Vec<ObjectId> = participations.iter().map(|p| p.program_id).collect();
    let by_program: HashMap<ObjectId, &ProgramParticipation> =
        participations.iter().map(|p| (p.program_id, p)).collect();

    let history_programs: Vec<Program> = programs
        .find(doc! { "_id": { "$in": history_ids } })
        .await?
        .try_collect()
        .await?;
    let program_history: Vec<ProgramHistoryEntry> = history_programs
        .into_iter()
        .filter_map(|program| {
            let entry = program.id.and_then(|id| by_program.get(&id))?;
            Some(ProgramHistoryEntry {
                status: entry.status.clone(),
                role: entry.role.clone(),
                enrolled_at: entry.enrolled_at.to_rfc3339(),
                program,
            })
        })
        .collect();

    Ok(Json(MemberProgramsResponse {
        all_programs,
        enrolled_program_ids,
        program_history,
    }))
}

pub async fn enroll_in_program(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(program_id): Path<String>,
) -> Result<Json<Value>> {
    let member = current_member(&state, &claims).await?;
    let member_id = member.id.ok_or(AppError::DocumentNotFound)?;
    let program_oid = ObjectId::parse_str(&program_id)?;

    let programs: Collection<Program> = state.db.collection("programs");
    let program = programs
        .find_one(doc! { "_id": program_oid, "is_active": true })
        .await?
        .ok_or(AppError::DocumentNotFound)?;

    let participation: Collection<ProgramParticipation> =
        state.db.collection("program_participation");
    let existing = participation
        .find_one(doc! { "member_id": member_id, "program_id": program_oid })
        .await?;
    if existing.is_some() {
        return Ok(Json(json!({
            "success": true,
            "message": format!("You are already enrolled in \"{}\".", program.title),
        })));
    }

    participation
        .insert_one(&ProgramParticipation {
            id: None,
            member_id,
            program_id: program_oid,
            status: participation_status::ACTIVE.to_string(),
            role: "participant".to_string(),
            enrolled_at: Utc::now(),
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("You have successfully enrolled in \"{}\"!", program.title),
    })))
}
