use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{CreateTenantRequest, Tenant, TenantPatch, TenantWithKey};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantService;

/// GET /admin/tenants
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Tenant>> {
    Ok(ApiResponse::success(state.store.list_tenants().await?))
}

/// POST /admin/tenants - the response is the only time the API key is shown
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateTenantRequest>, JsonRejection>,
) -> ApiResult<TenantWithKey> {
    let Json(req) = payload?;
    let created = TenantService::new(state.store.as_ref())
        .create_tenant(req)
        .await?;
    Ok(ApiResponse::created(created))
}

/// GET /admin/tenants/:id
pub async fn get(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Tenant> {
    let Path(id) = path?;
    Ok(ApiResponse::success(state.store.get_tenant(id).await?))
}

/// PATCH /admin/tenants/:id - an empty `domain` clears it
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<TenantPatch>, JsonRejection>,
) -> ApiResult<Tenant> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    let tenant = TenantService::new(state.store.as_ref())
        .update_tenant(id, patch)
        .await?;
    Ok(ApiResponse::success(tenant))
}

/// DELETE /admin/tenants/:id - cascades to users, forms and submissions
pub async fn remove(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = path?;
    TenantService::new(state.store.as_ref())
        .delete_tenant(id)
        .await?;
    Ok(ApiResponse::no_content())
}

/// POST /admin/tenants/:id/api-key - issue a new key, revoking the old one
pub async fn rotate_key(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<TenantWithKey> {
    let Path(id) = path?;
    let rotated = TenantService::new(state.store.as_ref())
        .rotate_key(id)
        .await?;
    Ok(ApiResponse::success(rotated))
}
