use axum::extract::{
    rejection::{PathRejection, QueryRejection},
    Extension, Path, Query, State,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Page, PageRequest, Submission};
use crate::middleware::{ApiResponse, ApiResult, Principal};
use crate::services::FormService;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Case-insensitive substring of the submitted data
    pub keyword: Option<String>,
}

/// GET /admin/forms/:id/submissions - newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Page<Submission>> {
    let Path(form_id) = path?;
    let Query(query) = query?;
    let page = FormService::new(state.store.as_ref(), &principal)
        .list_submissions(
            form_id,
            PageRequest::new(query.page, query.page_size),
            query.keyword.as_deref(),
        )
        .await?;
    Ok(ApiResponse::success(page))
}

/// GET /admin/forms/:id/submissions/:sid
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<Submission> {
    let Path((form_id, id)) = path?;
    let submission = FormService::new(state.store.as_ref(), &principal)
        .get_submission(form_id, id)
        .await?;
    Ok(ApiResponse::success(submission))
}

/// DELETE /admin/forms/:id/submissions/:sid
pub async fn remove(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<()> {
    let Path((form_id, id)) = path?;
    FormService::new(state.store.as_ref(), &principal)
        .delete_submission(form_id, id)
        .await?;
    Ok(ApiResponse::no_content())
}
