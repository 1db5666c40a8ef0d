use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{AuthService, LoginRequest, RefreshRequest, TokenPair};

/// POST /admin/auth/login - exchange email and password for a token pair
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<TokenPair> {
    let Json(req) = payload?;
    let pair = AuthService::new(state.store.as_ref(), &state.config.security)
        .login(&req)
        .await?;
    Ok(ApiResponse::success(pair))
}

/// POST /admin/auth/refresh - rotate a refresh token into a new pair
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<TokenPair> {
    let Json(req) = payload?;
    let pair = AuthService::new(state.store.as_ref(), &state.config.security)
        .refresh(&req.refresh_token)
        .await?;
    Ok(ApiResponse::success(pair))
}

/// POST /admin/auth/logout - forget a refresh token; unknown tokens are not an error
pub async fn logout(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(req) = payload?;
    AuthService::new(state.store.as_ref(), &state.config.security)
        .logout(&req.refresh_token)
        .await?;
    Ok(ApiResponse::success(json!({ "logged_out": true })))
}
