// Templates are readable by any logged-in caller; writes are admin-only (see app.rs routing).
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{FieldTemplate, FieldTemplateInput, FieldTemplatePatch};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::form_service;

/// GET /admin/field-templates
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<FieldTemplate>> {
    Ok(ApiResponse::success(state.store.list_field_templates().await?))
}

/// POST /admin/field-templates
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<FieldTemplateInput>, JsonRejection>,
) -> ApiResult<FieldTemplate> {
    let Json(input) = payload?;
    let template = form_service::create_template(state.store.as_ref(), input).await?;
    Ok(ApiResponse::created(template))
}

/// PATCH /admin/field-templates/:id
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<FieldTemplatePatch>, JsonRejection>,
) -> ApiResult<FieldTemplate> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    let template = form_service::update_template(state.store.as_ref(), id, patch).await?;
    Ok(ApiResponse::success(template))
}

/// DELETE /admin/field-templates/:id
pub async fn remove(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = path?;
    state.store.delete_field_template(id).await?;
    Ok(ApiResponse::no_content())
}
