use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::field::FieldType;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FieldTemplate {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub options: Vec<String>,
    pub validation_regex: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldTemplateInput {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    pub validation_regex: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldTemplatePatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: Option<FieldType>,
    pub required: Option<bool>,
    pub options: Option<Vec<String>>,
    pub validation_regex: Option<String>,
}

impl FieldTemplatePatch {
    pub fn regex_update(&self) -> Option<Option<String>> {
        self.validation_regex
            .as_ref()
            .map(|re| if re.is_empty() { None } else { Some(re.clone()) })
    }
}
