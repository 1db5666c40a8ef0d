// handlers/mod.rs - handlers grouped by access tier
//
// public    - no credentials (/api submission endpoints, /admin/auth login/refresh/logout)
// protected - require_login: bearer JWT or tenant API key, tenant-scoped
// elevated  - require_login + require_admin
pub mod elevated;
pub mod protected;
pub mod public;
