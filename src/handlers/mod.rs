pub(crate) mod auth;
pub(crate) mod auth_otp;
pub(crate) mod content;
pub(crate) mod members;
