pub mod auth;
pub mod response;

pub use auth::{require_admin, require_login, AuthMethod, Principal};
pub use response::{ApiResponse, ApiResult};
