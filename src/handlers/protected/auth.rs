use axum::extract::{Extension, State};
use serde::Serialize;

use crate::app::AppState;
use crate::database::models::{Tenant, User};
use crate::database::StoreError;
use crate::middleware::{ApiResponse, ApiResult, Principal};

#[derive(Debug, Serialize)]
pub struct CurrentSession {
    pub principal: Principal,
    /// `None` for API-key callers.
    pub user: Option<User>,
    /// The tenant in scope, if any.
    pub tenant: Option<Tenant>,
}

/// GET /admin/auth/current - who is calling, and on behalf of which tenant
pub async fn current(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<CurrentSession> {
    let user = match principal.user_id {
        Some(id) => Some(state.store.get_user(id).await?),
        None => None,
    };
    let tenant = match principal.scope {
        Some(id) => match state.store.get_tenant(id).await {
            Ok(tenant) => Some(tenant),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };
    Ok(ApiResponse::success(CurrentSession {
        principal,
        user,
        tenant,
    }))
}
