use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path, State,
    },
    Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{CreateUserRequest, UpdateUserRequest, User};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Principal};
use crate::services::UserService;

/// GET /admin/users
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(state.store.list_users().await?))
}

/// POST /admin/users
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Json(req) = payload?;
    let user = UserService::new(state.store.as_ref(), state.config.security.min_password_length)
        .create_user(req)
        .await?;
    Ok(ApiResponse::created(user))
}

/// GET /admin/users/:id
pub async fn get(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<User> {
    let Path(id) = path?;
    Ok(ApiResponse::success(state.store.get_user(id).await?))
}

/// PATCH /admin/users/:id
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Path(id) = path?;
    let Json(req) = payload?;
    let user = UserService::new(state.store.as_ref(), state.config.security.min_password_length)
        .update_user(id, req)
        .await?;
    Ok(ApiResponse::success(user))
}

/// DELETE /admin/users/:id - an admin cannot delete their own account
pub async fn remove(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = path?;
    if principal.user_id == Some(id) {
        return Err(ApiError::bad_request("Cannot delete the account you are using"));
    }
    state.store.delete_user(id).await?;
    tracing::info!("Deleted user {}", id);
    Ok(ApiResponse::no_content())
}
