use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::members;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(members::dashboard))
        .route("/profile", get(members::get_profile).put(members::update_profile))
        .route("/events", get(members::member_events))
        .route("/events/:id/register", post(members::register_for_event))
        .route("/events/:id/cancel", post(members::cancel_event_registration))
        .route("/programs", get(members::member_programs))
        .route("/programs/:id/enroll", post(members::enroll_in_program))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
