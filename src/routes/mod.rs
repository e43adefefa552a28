pub mod auth;
pub mod forum;
