use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::field::{Field, FieldInput};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Form {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub notify_emails: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Form with its ordered fields and submission count, as listed in the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct FormDetail {
    #[serde(flatten)]
    pub form: Form,
    pub fields: Vec<Field>,
    pub submissions_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFormRequest {
    /// Required for admins acting without a tenant scope; ignored otherwise.
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub notify_emails: Vec<String>,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFormRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub notify_emails: Option<Vec<String>>,
    pub allowed_origins: Option<Vec<String>>,
    /// When present, replaces every field of the form.
    pub fields: Option<Vec<FieldInput>>,
}

#[derive(Debug, Clone)]
pub struct NewForm {
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub notify_emails: Vec<String>,
    pub allowed_origins: Vec<String>,
}

/// Store-level form update. `Some(None)` clears an optional column.
#[derive(Debug, Clone, Default)]
pub struct FormPatch {
    pub name: Option<String>,
    pub slug: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub notify_emails: Option<Vec<String>>,
    pub allowed_origins: Option<Vec<String>>,
}

/// Public view of a form: just what a front end needs to render it.
#[derive(Debug, Clone, Serialize)]
pub struct PublicForm {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<PublicField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    pub options: Vec<String>,
    pub validation_regex: Option<String>,
    pub position: i32,
}

impl PublicForm {
    pub fn new(form: &Form, fields: &[Field]) -> Self {
        Self {
            id: form.id,
            name: form.name.clone(),
            description: form.description.clone(),
            fields: fields
                .iter()
                .map(|f| PublicField {
                    name: f.name.clone(),
                    field_type: f.field_type.to_string(),
                    required: f.required,
                    options: f.options.clone(),
                    validation_regex: f.validation_regex.clone(),
                    position: f.position,
                })
                .collect(),
        }
    }
}
