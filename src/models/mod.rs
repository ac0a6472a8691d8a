pub mod auth;
pub mod preferences;
pub mod recipe;
pub mod user;
pub mod week;
