//! Public submission ingestion.
//!
//! A submission moves through four states, each a distinct type so a step cannot be skipped:
//! [`Received`] (form resolved) → [`OriginChecked`] → [`ShapeValidated`] → [`Persisted`].
//! Any failure is terminal and nothing is written before the last step.
use axum::http::HeaderMap;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::hash_token;
use crate::config::UnknownFieldPolicy;
use crate::database::models::{Field, Form, NewSubmission, Tenant};
use crate::database::{FormStore, StoreError};
use crate::validation::{SubmissionValidator, Validated, ValidationReport};

pub const UNKNOWN_IP: &str = "0.0.0.0";
pub const UNKNOWN_USER_AGENT: &str = "-";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unknown form")]
    UnknownForm,
    #[error("origin not allowed: {0}")]
    OriginNotAllowed(String),
    #[error(transparent)]
    Invalid(#[from] ValidationReport),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => IngestError::UnknownForm,
            other => IngestError::Store(other),
        }
    }
}

/// Request facts the flow needs, copied out of the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub origin: Option<String>,
    pub api_key: Option<String>,
    pub ip: String,
    pub user_agent: String,
}

impl ClientMeta {
    pub fn from_headers(headers: &HeaderMap, ip_headers: &[String]) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            origin: text("origin"),
            api_key: text("x-api-key"),
            ip: client_ip(headers, ip_headers),
            user_agent: headers
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .unwrap_or(UNKNOWN_USER_AGENT)
                .to_string(),
        }
    }
}

/// First configured header present wins; proxies append, so its first entry is the client.
pub fn client_ip(headers: &HeaderMap, ip_headers: &[String]) -> String {
    ip_headers
        .iter()
        .filter_map(|name| headers.get(name.as_str()))
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(',').next())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_IP)
        .to_string()
}

/// The origin allow-list for a form: its own when set, else its tenant's.
pub fn effective_origins<'a>(form: &'a Form, tenant: &'a Tenant) -> &'a [String] {
    if form.allowed_origins.is_empty() {
        &tenant.allowed_origins
    } else {
        &form.allowed_origins
    }
}

/// `Ok(Some(origin))` when an origin was sent and may be echoed back, `Ok(None)` when none was sent.
/// An empty allow-list admits every origin.
pub fn check_origin(allowed: &[String], origin: Option<&str>) -> Result<Option<String>, IngestError> {
    let origin = match origin.map(str::trim).filter(|o| !o.is_empty()) {
        Some(o) => o,
        None => return Ok(None),
    };
    if allowed.is_empty() || allowed.iter().any(|a| a.trim() == origin) {
        Ok(Some(origin.to_string()))
    } else {
        Err(IngestError::OriginNotAllowed(origin.to_string()))
    }
}

/// Form resolved from the path, with its tenant and current fields.
#[derive(Debug)]
pub struct Received {
    pub form: Form,
    pub tenant: Tenant,
    pub fields: Vec<Field>,
}

impl Received {
    /// `form_ref` is a form id, or a slug resolved within the tenant owning `api_key`.
    pub async fn resolve(
        store: &dyn FormStore,
        form_ref: &str,
        api_key: Option<&str>,
    ) -> Result<Self, IngestError> {
        let key_tenant = match api_key {
            Some(key) => Some(
                store
                    .find_tenant_by_api_key_hash(&hash_token(key))
                    .await?
                    .ok_or(IngestError::UnknownForm)?,
            ),
            None => None,
        };

        let form = match Uuid::parse_str(form_ref) {
            Ok(id) => store.get_form(id).await?,
            Err(_) => {
                let tenant = key_tenant.as_ref().ok_or(IngestError::UnknownForm)?;
                store
                    .find_form_by_slug(tenant.id, form_ref)
                    .await?
                    .ok_or(IngestError::UnknownForm)?
            }
        };
        if key_tenant.as_ref().map_or(false, |t| t.id != form.tenant_id) {
            return Err(IngestError::UnknownForm);
        }

        let tenant = match key_tenant {
            Some(t) => t,
            None => store.get_tenant(form.tenant_id).await?,
        };
        if !tenant.is_active {
            debug!("Submission for form {} of inactive tenant {}", form.id, tenant.id);
            return Err(IngestError::UnknownForm);
        }

        let fields = store.list_fields(form.id).await?;
        Ok(Self { form, tenant, fields })
    }

    pub fn check_origin(self, origin: Option<&str>) -> Result<OriginChecked, IngestError> {
        let allowed_origin = check_origin(effective_origins(&self.form, &self.tenant), origin)
            .map_err(|e| {
                warn!("Form {}: {}", self.form.id, e);
                e
            })?;
        Ok(OriginChecked {
            received: self,
            allowed_origin,
        })
    }
}

#[derive(Debug)]
pub struct OriginChecked {
    pub received: Received,
    /// Echoed back in `Access-Control-Allow-Origin`.
    pub allowed_origin: Option<String>,
}

impl OriginChecked {
    pub fn validate(
        self,
        body: &Value,
        policy: UnknownFieldPolicy,
    ) -> Result<ShapeValidated, IngestError> {
        let validator = SubmissionValidator::build(&self.received.fields, policy);
        let validated = validator.validate(body)?;
        Ok(ShapeValidated {
            checked: self,
            validated,
        })
    }
}

#[derive(Debug)]
pub struct ShapeValidated {
    pub checked: OriginChecked,
    pub validated: Validated,
}

impl ShapeValidated {
    pub async fn persist(
        self,
        store: &dyn FormStore,
        ip: String,
        user_agent: String,
    ) -> Result<Persisted, IngestError> {
        let ShapeValidated { checked, validated } = self;
        let form = &checked.received.form;

        // One field per call: a key another submission registered first must not drop the rest.
        for input in validated.new_fields {
            let name = input.name.clone();
            match store.append_fields(form.id, vec![input]).await {
                Ok(_) => info!("Registered field '{}' on form {}", name, form.id),
                Err(StoreError::Conflict(_)) => {
                    debug!("Field '{}' on form {} was registered concurrently", name, form.id)
                }
                Err(e) => return Err(e.into()),
            }
        }

        let submission = store
            .insert_submission(NewSubmission {
                form_id: form.id,
                tenant_id: form.tenant_id,
                ip,
                user_agent,
                data: Value::Object(validated.data),
            })
            .await?;
        info!("Stored submission {} for form {}", submission.id, form.id);

        Ok(Persisted {
            submission_id: submission.id,
            allowed_origin: checked.allowed_origin,
        })
    }
}

#[derive(Debug)]
pub struct Persisted {
    pub submission_id: Uuid,
    pub allowed_origin: Option<String>,
}
