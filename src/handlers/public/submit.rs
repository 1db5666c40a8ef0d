// handlers/public/submit.rs - public form metadata and submission intake
//
// CORS here is decided per form (its own allow-list, else its tenant's), so these routes answer
// CORS themselves instead of going through a CorsLayer.
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use tracing::debug;

use crate::app::AppState;
use crate::database::models::PublicForm;
use crate::database::FormStore;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::services::ingest::{ClientMeta, IngestError, OriginChecked, Received};

const ALLOW_METHODS: &str = "POST, OPTIONS";
const ALLOW_HEADERS: &str = "content-type, x-api-key";
const MAX_AGE_SECS: &str = "600";

/// GET /api/forms/:form - field metadata a front end needs to render the form
pub async fn form_get(
    State(state): State<AppState>,
    Path(form_ref): Path<String>,
    headers: HeaderMap,
) -> Response {
    let meta = ClientMeta::from_headers(&headers, &state.config.submissions.client_ip_headers);
    match resolve_and_check(state.store.as_ref(), &form_ref, &meta).await {
        Ok(checked) => {
            let form = PublicForm::new(&checked.received.form, &checked.received.fields);
            with_cors(
                ApiResponse::success(form).into_response(),
                checked.allowed_origin.as_deref(),
            )
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// POST /api/forms/:form/submit - validate and store one submission
///
/// Errors raised after the origin check still carry `Access-Control-Allow-Origin` so the
/// calling page can read them.
pub async fn submit_post(
    State(state): State<AppState>,
    Path(form_ref): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let meta = ClientMeta::from_headers(&headers, &state.config.submissions.client_ip_headers);
    let store = state.store.as_ref();

    let checked = match resolve_and_check(store, &form_ref, &meta).await {
        Ok(checked) => checked,
        Err(e) => return ApiError::from(e).into_response(),
    };
    let allowed_origin = checked.allowed_origin.clone();

    let result = async {
        let payload: Value = serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
        let persisted = checked
            .validate(&payload, state.config.submissions.unknown_fields)?
            .persist(store, meta.ip, meta.user_agent)
            .await?;
        Ok::<_, ApiError>(ApiResponse::created(json!({ "id": persisted.submission_id })))
    }
    .await;

    with_cors(result.into_response(), allowed_origin.as_deref())
}

/// OPTIONS /api/forms/:form/submit - CORS preflight against the form's allow-list
pub async fn submit_preflight(
    State(state): State<AppState>,
    Path(form_ref): Path<String>,
    headers: HeaderMap,
) -> Response {
    let meta = ClientMeta::from_headers(&headers, &state.config.submissions.client_ip_headers);
    match resolve_and_check(state.store.as_ref(), &form_ref, &meta).await {
        Ok(checked) => {
            let mut response = StatusCode::NO_CONTENT.into_response();
            let h = response.headers_mut();
            h.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOW_METHODS),
            );
            h.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOW_HEADERS),
            );
            h.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
            with_cors(response, checked.allowed_origin.as_deref())
        }
        Err(e) => {
            debug!("Preflight for {} refused: {}", form_ref, e);
            ApiError::from(e).into_response()
        }
    }
}

async fn resolve_and_check(
    store: &dyn FormStore,
    form_ref: &str,
    meta: &ClientMeta,
) -> Result<OriginChecked, IngestError> {
    Received::resolve(store, form_ref, meta.api_key.as_deref())
        .await?
        .check_origin(meta.origin.as_deref())
}

fn with_cors(mut response: Response, origin: Option<&str>) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    if let Some(value) = origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    response
}
