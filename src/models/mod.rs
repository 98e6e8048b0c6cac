pub mod contact;
pub mod event;
pub mod gallery;
pub mod member;
pub mod otp;
pub mod program;
pub mod team;
