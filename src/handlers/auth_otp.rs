use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use validator::Validate;

use crate::dtos::auth_dtos::{OtpResponse, ResendOtpRequest, SendOtpRequest, VerifyOtpRequest};
use crate::state::AppState;

const GENERIC_SEND_FAILURE: &str = "Failed to send OTP. Please try again later.";
const GENERIC_VERIFY_FAILURE: &str = "Failed to verify OTP. Please try again later.";

/// AJAX form posts carry the X-Requested-With marker header.
fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false)
}

/// Non-AJAX fallback: redirect and carry the message in a flash cookie for
/// the next page render.
fn flash_redirect(jar: CookieJar, target: &str, message: &str) -> Response {
    let jar = jar.add(Cookie::build(("flash", message.to_string())).path("/").build());
    (jar, Redirect::to(target)).into_response()
}

// POST /send-otp
pub async fn send_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(req): Form<SendOtpRequest>,
) -> Response {
    let ajax = is_ajax(&headers);

    if let Err(errors) = req.validate() {
        let error = format!("Validation error: {}", errors);
        return if ajax {
            Json(OtpResponse::err(error)).into_response()
        } else {
            flash_redirect(jar, "/register", &error)
        };
    }

    let email = req.email.trim().to_string();

    match state.otp_service.issue(&email).await {
        Ok(_) => {
            let message = format!("OTP sent to {}. Check your email!", email);
            if ajax {
                Json(OtpResponse::ok(message)).into_response()
            } else {
                flash_redirect(jar, "/verify-otp", &message)
            }
        }
        Err(e) => {
            // Persistence and dispatch failures alike collapse to one
            // generic message for the caller.
            tracing::error!("Failed to send OTP to {}: {}", email, e);
            if ajax {
                Json(OtpResponse::err(GENERIC_SEND_FAILURE)).into_response()
            } else {
                flash_redirect(jar, "/register", GENERIC_SEND_FAILURE)
            }
        }
    }
}

// POST /verify-otp
pub async fn verify_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(req): Form<VerifyOtpRequest>,
) -> Response {
    let ajax = is_ajax(&headers);
    let email = req.email.trim().to_string();

    if email.is_empty() || req.otp.trim().is_empty() {
        let error = "Email and OTP are required";
        return if ajax {
            Json(OtpResponse::err(error)).into_response()
        } else {
            flash_redirect(jar, "/verify-otp", error)
        };
    }

    match state.otp_service.verify(&email, &req.otp).await {
        Ok(outcome) if outcome.is_success() => {
            let message = outcome.message();
            match state.otp_service.generate_verification_token(&email) {
                Ok(token) => {
                    if ajax {
                        Json(OtpResponse::ok_with_token(message, token)).into_response()
                    } else {
                        let jar = jar.add(
                            Cookie::build(("verification_token", token))
                                .path("/")
                                .build(),
                        );
                        flash_redirect(jar, "/register", &message)
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to generate verification token for {}: {}", email, e);
                    if ajax {
                        Json(OtpResponse::err(GENERIC_VERIFY_FAILURE)).into_response()
                    } else {
                        flash_redirect(jar, "/verify-otp", GENERIC_VERIFY_FAILURE)
                    }
                }
            }
        }
        Ok(outcome) => {
            let error = outcome.message();
            if ajax {
                Json(OtpResponse::err(error)).into_response()
            } else {
                flash_redirect(jar, "/verify-otp", &error)
            }
        }
        Err(e) => {
            tracing::error!("OTP verification error for {}: {}", email, e);
            if ajax {
                Json(OtpResponse::err(GENERIC_VERIFY_FAILURE)).into_response()
            } else {
                flash_redirect(jar, "/verify-otp", GENERIC_VERIFY_FAILURE)
            }
        }
    }
}

// POST /resend-otp (AJAX endpoint, JSON only)
pub async fn resend_otp(
    State(state): State<AppState>,
    Form(req): Form<ResendOtpRequest>,
) -> Json<OtpResponse> {
    if let Err(errors) = req.validate() {
        return Json(OtpResponse::err(format!("Validation error: {}", errors)));
    }

    let email = req.email.trim().to_string();

    match state.otp_service.can_resend(&email).await {
        Ok(false) => Json(OtpResponse::err("Please wait before requesting a new OTP")),
        Ok(true) => match state.otp_service.issue(&email).await {
            Ok(_) => Json(OtpResponse::ok("OTP sent successfully!")),
            Err(e) => {
                tracing::error!("Failed to resend OTP to {}: {}", email, e);
                Json(OtpResponse::err(GENERIC_SEND_FAILURE))
            }
        },
        Err(e) => {
            tracing::error!("Resend check failed for {}: {}", email, e);
            Json(OtpResponse::err(GENERIC_SEND_FAILURE))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ajax_detection_matches_header_case_insensitively() {
        let mut headers = HeaderMap::new();
        assert!(!is_ajax(&headers));

        headers.insert("x-requested-with", "XMLHttpRequest".parse().unwrap());
        assert!(is_ajax(&headers));

        headers.insert("x-requested-with", "xmlhttprequest".parse().unwrap());
        assert!(is_ajax(&headers));

        headers.insert("x-requested-with", "fetch".parse().unwrap());
        assert!(!is_ajax(&headers));
    }
}
