// handlers/elevated/mod.rs - endpoints behind require_login + require_admin
pub mod field_templates;
pub mod tenants;
pub mod users;
