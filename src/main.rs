use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod config;
mod database;
mod dtos;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use services::otp_service::OtpService;
use state::AppState;

const OTP_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = config::AppConfig::from_env();

    let db = database::connection::connect(&config).await?;
    database::connection::ensure_indexes(&db).await?;

    let state = AppState::new(db, config)?;
    tracing::info!("Mail and OTP services initialized");

    spawn_otp_sweeper(state.otp_service.clone());

    let addr = SocketAddr::new(state.config.host.parse()?, state.config.port);
    let app = build_router(state);

    tracing::info!("Server starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .merge(routes::auth_otp_routes::routes()) // OTP routes at the root
        .nest("/api/auth", routes::auth::routes())
        .nest("/api/members", routes::members::routes(state.clone()))
        .nest("/api", routes::content::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Periodic garbage collection of long-expired OTP records.
fn spawn_otp_sweeper(otp_service: OtpService) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(OTP_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match otp_service.sweep_expired().await {
                Ok(0) => {}
                Ok(count) => tracing::info!("OTP sweep removed {} expired records", count),
                Err(e) => tracing::warn!("OTP sweep failed: {}", e),
            }
        }
    });
}

async fn root_handler() -> &'static str {
    "Shanti Yuwa Club API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! { "ping": 1 }).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "site": state.config.site_name,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
