use axum::extract::{
    rejection::{PathRejection, QueryRejection},
    Extension, Path, Query, State,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, Principal};
use crate::services::form_service::{DailyReport, ValueReport};
use crate::services::FormService;

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ValuesQuery {
    pub field: Option<String>,
}

/// GET /admin/analytics/daily?days= - submissions per UTC day in scope
pub async fn daily(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    query: Result<Query<DailyQuery>, QueryRejection>,
) -> ApiResult<DailyReport> {
    let Query(query) = query?;
    let report = FormService::new(state.store.as_ref(), &principal)
        .daily(query.days)
        .await?;
    Ok(ApiResponse::success(report))
}

/// GET /admin/forms/:id/analytics/values?field= - submissions per distinct value (default `subject`)
pub async fn values(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ValuesQuery>, QueryRejection>,
) -> ApiResult<ValueReport> {
    let Path(id) = path?;
    let Query(query) = query?;
    let report = FormService::new(state.store.as_ref(), &principal)
        .value_counts(id, query.field)
        .await?;
    Ok(ApiResponse::success(report))
}
