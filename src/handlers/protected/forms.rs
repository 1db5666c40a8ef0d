use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path, State,
    },
    Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{CreateFormRequest, FormDetail, UpdateFormRequest};
use crate::middleware::{ApiResponse, ApiResult, Principal};
use crate::services::FormService;

/// GET /admin/forms - forms in scope, each with its fields and submission count
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<FormDetail>> {
    let forms = FormService::new(state.store.as_ref(), &principal).list_forms().await?;
    Ok(ApiResponse::success(forms))
}

/// POST /admin/forms - create a form, optionally with its fields
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CreateFormRequest>, JsonRejection>,
) -> ApiResult<FormDetail> {
    let Json(req) = payload?;
    let form = FormService::new(state.store.as_ref(), &principal)
        .create_form(req)
        .await?;
    Ok(ApiResponse::created(form))
}

/// GET /admin/forms/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<FormDetail> {
    let Path(id) = path?;
    let form = FormService::new(state.store.as_ref(), &principal).get_form(id).await?;
    Ok(ApiResponse::success(form))
}

/// PATCH /admin/forms/:id - a `fields` array replaces all fields
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateFormRequest>, JsonRejection>,
) -> ApiResult<FormDetail> {
    let Path(id) = path?;
    let Json(req) = payload?;
    let form = FormService::new(state.store.as_ref(), &principal)
        .update_form(id, req)
        .await?;
    Ok(ApiResponse::success(form))
}

/// DELETE /admin/forms/:id - removes fields and submissions with it
pub async fn remove(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = path?;
    FormService::new(state.store.as_ref(), &principal)
        .delete_form(id)
        .await?;
    Ok(ApiResponse::no_content())
}
