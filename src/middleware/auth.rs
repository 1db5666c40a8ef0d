use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{hash_token, validate_jwt};
use crate::database::models::Role;
use crate::database::StoreError;
use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const IMPERSONATE_HEADER: &str = "x-impersonate-tenant";

/// How the caller proved who they are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Bearer,
    ApiKey,
}

/// Authenticated caller, inserted into request extensions by [`require_login`].
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    /// `None` for API-key callers.
    pub user_id: Option<Uuid>,
    pub role: Role,
    /// Tenant the caller belongs to.
    pub tenant_id: Option<Uuid>,
    /// Tenant every request is confined to; `None` means all tenants.
    pub scope: Option<Uuid>,
    pub impersonating: bool,
    pub method: AuthMethod,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_access(&self, tenant_id: Uuid) -> bool {
        self.scope.map_or(true, |scope| scope == tenant_id)
    }

    pub fn authorize(&self, tenant_id: Uuid) -> Result<(), ApiError> {
        if self.can_access(tenant_id) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Resource belongs to another tenant"))
        }
    }
}

/// Authenticates by bearer JWT or tenant API key, then applies admin impersonation.
pub async fn require_login(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Owned copies: the request body is not Sync, so no borrow of it may cross an await.
    let bearer = extract_bearer(request.headers())?;
    let api_key = header_str(request.headers(), API_KEY_HEADER).map(str::to_string);
    let impersonate = header_str(request.headers(), IMPERSONATE_HEADER).map(str::to_string);

    let mut principal = if let Some(token) = bearer {
        principal_from_jwt(&state, &token).await?
    } else if let Some(key) = api_key {
        principal_from_api_key(&state, &key).await?
    } else {
        return Err(ApiError::unauthorized("Missing credentials"));
    };

    if let Some(raw) = impersonate {
        if principal.is_admin() {
            let tenant_id = Uuid::parse_str(raw.trim())
                .map_err(|_| ApiError::bad_request("X-Impersonate-Tenant must be a tenant id"))?;
            match state.store.get_tenant(tenant_id).await {
                Ok(_) => {
                    debug!("Admin {:?} impersonating tenant {}", principal.user_id, tenant_id);
                    principal.scope = Some(tenant_id);
                    principal.impersonating = true;
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(ApiError::not_found("Impersonated tenant does not exist"))
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Must run inside [`require_login`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = request.extensions().get::<Principal>().map(Principal::is_admin);
    match is_admin {
        Some(true) => Ok(next.run(request).await),
        Some(false) => Err(ApiError::forbidden("Admin role required")),
        None => Err(ApiError::unauthorized("Missing credentials")),
    }
}

async fn principal_from_jwt(state: &AppState, token: &str) -> Result<Principal, ApiError> {
    let claims = validate_jwt(token, &state.config.security.jwt_secret).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::from(e)
    })?;

    // The token may outlive the account; re-check on every request.
    let user = match state.store.get_user(claims.sub).await {
        Ok(user) => user,
        Err(StoreError::NotFound(_)) => return Err(ApiError::unauthorized("User no longer exists")),
        Err(e) => return Err(e.into()),
    };
    if !user.is_active {
        warn!("Inactive user {} presented a valid token", user.id);
        return Err(ApiError::unauthorized("User is inactive"));
    }

    let scope = match user.role {
        Role::Admin => None,
        Role::User => Some(
            user.tenant_id
                .ok_or_else(|| ApiError::forbidden("User is not bound to a tenant"))?,
        ),
    };

    Ok(Principal {
        user_id: Some(user.id),
        role: user.role,
        tenant_id: user.tenant_id,
        scope,
        impersonating: false,
        method: AuthMethod::Bearer,
    })
}

async fn principal_from_api_key(state: &AppState, key: &str) -> Result<Principal, ApiError> {
    let tenant = state
        .store
        .find_tenant_by_api_key_hash(&hash_token(key.trim()))
        .await?
        .filter(|t| t.is_active)
        .ok_or_else(|| {
            warn!("Rejected unknown or inactive API key");
            ApiError::unauthorized("Invalid API key")
        })?;

    Ok(Principal {
        user_id: None,
        role: Role::User,
        tenant_id: Some(tenant.id),
        scope: Some(tenant.id),
        impersonating: false,
        method: AuthMethod::ApiKey,
    })
}

/// `Ok(None)` when there is no Authorization header at all.
fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(raw) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = raw
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header format"))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        Some(_) => Err(ApiError::unauthorized("Empty bearer token")),
        None => Err(ApiError::unauthorized(
            "Authorization header must use Bearer token format",
        )),
    }
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}
