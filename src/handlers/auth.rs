use axum::{extract::State, response::Json};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use mongodb::{bson::doc, Collection};
use validator::Validate;

use crate::dtos::auth_dtos::{LoginRequest, RegisterRequest};
use crate::errors::{AppError, Result};
use crate::models::member::{AuthResponse, Claims, Member};
use crate::state::AppState;

const SESSION_TTL_SECONDS: i64 = 86_400; // 24 hours

fn issue_session_token(state: &AppState, member: &Member, member_id: &str) -> Result<String> {
    let claims = Claims {
        sub: member_id.to_string(),
        username: member.username.clone(),
        email: member.email.clone(),
        exp: (Utc::now().timestamp() + SESSION_TTL_SECONDS) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt_secret.as_ref()),
    )
    .map_err(|_| AppError::AuthError)
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let email = payload.email.trim().to_string();

    // Account creation is gated on a verified email: the token returned by
    // /verify-otp must be present and must name the same address.
    let verified_email = state
        .otp_service
        .decode_verification_token(&payload.verification_token)
        .map_err(|_| {
            AppError::invalid_data("Email verification required. Please verify your email first.")
        })?;
    if verified_email != email {
        return Err(AppError::invalid_data(
            "Registration email does not match the verified email",
        ));
    }

    let collection: Collection<Member> = state.db.collection("members");

    let username = payload.username.trim().to_string();
    let existing = collection
        .find_one(doc! {
            "$or": [
                { "username": &username },
                { "email": &email }
            ]
        })
        .await?;
    if existing.is_some() {
        return Err(AppError::DuplicateKey);
    }

    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|_| AppError::AuthError)?;

    let now = Utc::now();
    let member = Member {
        id: None,
        username,
        email,
        password_hash,
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        phone: payload.phone,
        bio: None,
        created_at: now,
        updated_at: now,
    };

    let result = collection.insert_one(&member).await?;
    let member_id = result
        .inserted_id
        .as_object_id()
        .ok_or(AppError::DocumentNotFound)?;

    let token = issue_session_token(&state, &member, &member_id.to_hex())?;

    let mut response = member.to_response();
    response.id = member_id.to_hex();

    tracing::info!("New member registered: {}", member.username);

    Ok(Json(AuthResponse {
        member: response,
        token,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let collection: Collection<Member> = state.db.collection("members");

    // Members may log in with either their username or their email
    let identifier = payload.username.trim();
    let member = collection
        .find_one(doc! {
            "$or": [
                { "username": identifier },
                { "email": identifier }
            ]
        })
        .await?
        .ok_or(AppError::AuthError)?;

    let valid = verify(&payload.password, &member.password_hash).map_err(|_| AppError::AuthError)?;
    if !valid {
        return Err(AppError::AuthError);
    }

    let member_id = member.id.ok_or(AppError::DocumentNotFound)?.to_hex();
    let token = issue_session_token(&state, &member, &member_id)?;

    Ok(Json(AuthResponse {
        member: member.to_response(),
        token,
    }))
}
