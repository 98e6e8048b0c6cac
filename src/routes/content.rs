use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::content;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/home", get(content::home))
        .route("/programs", get(content::list_programs))
        .route("/programs/:slug", get(content::program_detail))
        .route("/events", get(content::list_events))
        .route("/gallery", get(content::gallery))
        .route("/gallery/categories", get(content::gallery_categories))
        .route("/team", get(content::list_team))
        .route("/contact", post(content::submit_contact))
}
