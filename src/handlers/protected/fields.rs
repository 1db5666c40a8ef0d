use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path, State,
    },
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Field, FieldInput, FieldPatch};
use crate::middleware::{ApiResponse, ApiResult, Principal};
use crate::services::FormService;

/// Body of an append: a single definition or an array of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<FieldInput>),
    One(FieldInput),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<FieldInput> {
        match self {
            OneOrMany::Many(inputs) => inputs,
            OneOrMany::One(input) => vec![input],
        }
    }
}

/// GET /admin/forms/:id/fields - in position order
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<Field>> {
    let Path(form_id) = path?;
    let fields = FormService::new(state.store.as_ref(), &principal)
        .list_fields(form_id)
        .await?;
    Ok(ApiResponse::success(fields))
}

/// POST /admin/forms/:id/fields - append after the existing fields
pub async fn append(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<OneOrMany>, JsonRejection>,
) -> ApiResult<Vec<Field>> {
    let Path(form_id) = path?;
    let Json(body) = payload?;
    let added = FormService::new(state.store.as_ref(), &principal)
        .append_fields(form_id, body.into_vec())
        .await?;
    Ok(ApiResponse::created(added))
}

/// PATCH /admin/forms/:id/fields/:field_id
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<FieldPatch>, JsonRejection>,
) -> ApiResult<Field> {
    let Path((form_id, field_id)) = path?;
    let Json(patch) = payload?;
    let field = FormService::new(state.store.as_ref(), &principal)
        .update_field(form_id, field_id, patch)
        .await?;
    Ok(ApiResponse::success(field))
}

/// DELETE /admin/forms/:id/fields/:field_id
pub async fn remove(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<()> {
    let Path((form_id, field_id)) = path?;
    FormService::new(state.store.as_ref(), &principal)
        .delete_field(form_id, field_id)
        .await?;
    Ok(ApiResponse::no_content())
}
