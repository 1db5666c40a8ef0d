// app.rs - shared state and router assembly
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::FormStore;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{require_admin, require_login};

/// Everything a handler may touch. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FormStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn FormStore>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let admin_cors = admin_cors(&state.config);
    let body_limit = DefaultBodyLimit::max(state.config.api.max_request_size_bytes);

    let admin = Router::new()
        .merge(admin_public_routes())
        .merge(admin_protected_routes(state.clone()))
        .merge(admin_elevated_routes(state.clone()))
        .layer(admin_cors);

    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/admin", admin)
        .nest("/api", submission_routes())
        .layer(body_limit);

    let router = if state.config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };
    router.with_state(state)
}

/// Public submission API. CORS is answered per form by the handlers, not by a layer.
fn submission_routes() -> Router<AppState> {
    Router::new()
        .route("/forms/:form", get(public::submit::form_get))
        .route(
            "/forms/:form/submit",
            post(public::submit::submit_post).options(public::submit::submit_preflight),
        )
}

fn admin_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
}

fn admin_protected_routes(state: AppState) -> Router<AppState> {
    use protected::{analytics, auth, fields, forms, submissions};

    Router::new()
        .route("/auth/current", get(auth::current))
        .route("/field-templates", get(elevated::field_templates::list))
        .route("/forms", get(forms::list).post(forms::create))
        .route(
            "/forms/:id",
            get(forms::get).patch(forms::update).delete(forms::remove),
        )
        .route("/forms/:id/fields", get(fields::list).post(fields::append))
        .route(
            "/forms/:id/fields/:field_id",
            patch(fields::update).delete(fields::remove),
        )
        .route("/forms/:id/submissions", get(submissions::list))
        .route(
            "/forms/:id/submissions/:sid",
            get(submissions::get).delete(submissions::remove),
        )
        .route("/forms/:id/analytics/values", get(analytics::values))
        .route("/analytics/daily", get(analytics::daily))
        .route_layer(from_fn_with_state(state, require_login))
}

fn admin_elevated_routes(state: AppState) -> Router<AppState> {
    use elevated::{field_templates, tenants, users};

    Router::new()
        .route("/tenants", get(tenants::list).post(tenants::create))
        .route(
            "/tenants/:id",
            get(tenants::get).patch(tenants::update).delete(tenants::remove),
        )
        .route("/tenants/:id/api-key", post(tenants::rotate_key))
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/:id",
            get(users::get).patch(users::update).delete(users::remove),
        )
        .route("/field-templates", post(field_templates::create))
        .route(
            "/field-templates/:id",
            patch(field_templates::update).delete(field_templates::remove),
        )
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state, require_login))
}

/// CORS for the admin front end: the configured origins, or any origin when none are set.
fn admin_cors(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("content-type"),
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-impersonate-tenant"),
        ])
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "status": "success",
        "data": {
            "name": "Forms API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Multi-tenant form builder backend",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "submit": "/api/forms/:form/submit (public, per-form CORS)",
                "form": "/api/forms/:form (public field metadata)",
                "auth": "/admin/auth/login, /admin/auth/refresh, /admin/auth/logout (public)",
                "admin": "/admin/forms, /admin/field-templates, /admin/analytics/daily, /admin/forms/:id/analytics/values (login)",
                "elevated": "/admin/tenants, /admin/users (admin)",
            }
        }
    }))
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = state.store.backend_name();

    match state.store.health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "status": "success",
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": backend,
                    "durable": state.store.is_durable(),
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed on {} store: {}", backend, e);
            (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "error": {
                        "code": "SERVICE_UNAVAILABLE",
                        "message": format!("{} store unavailable", backend),
                    }
                })),
            )
        }
    }
}
