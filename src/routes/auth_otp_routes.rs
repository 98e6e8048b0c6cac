use axum::{routing::post, Router};

use crate::{handlers::auth_otp, state::AppState};

/// Email-verification endpoints, mounted at the root so the registration
/// pages can post to /send-otp, /verify-otp and /resend-otp directly.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Request an OTP for a new email
        .route("/send-otp", post(auth_otp::send_otp))
        // Verify a submitted OTP
        .route("/verify-otp", post(auth_otp::verify_otp))
        // Rate-limited resend (AJAX only)
        .route("/resend-otp", post(auth_otp::resend_otp))
}
