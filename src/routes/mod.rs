pub(crate) mod auth;
pub(crate) mod auth_otp_routes;
pub(crate) mod content;
pub(crate) mod members;
