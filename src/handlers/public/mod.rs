// handlers/public/mod.rs - endpoints reachable without credentials
pub mod auth;
pub mod submit;
