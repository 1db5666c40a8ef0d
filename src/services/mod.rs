pub mod auth_service;
pub mod form_service;
pub mod ingest;
pub mod tenant_service;
pub mod user_service;

pub use auth_service::{AuthError, AuthService, TokenPair};
pub use form_service::FormService;
pub use ingest::IngestError;
pub use tenant_service::{TenantError, TenantService};
pub use user_service::{UserError, UserService};
