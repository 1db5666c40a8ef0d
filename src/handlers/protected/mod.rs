// handlers/protected/mod.rs - endpoints behind require_login, confined to the principal's scope
pub mod analytics;
pub mod auth;
pub mod fields;
pub mod forms;
pub mod submissions;
