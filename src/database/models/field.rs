use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Type given to registered keys whose values are arrays, objects or null; accepts any value.
pub const JSON_FIELD_TYPE: &str = "json";

/// Declared type of a form field. Types this service does not know are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Email,
    Number,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Number => "number",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::Other(other) => other,
        }
    }
}

impl From<String> for FieldType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "text" => FieldType::Text,
            "email" => FieldType::Email,
            "number" => FieldType::Number,
            "textarea" => FieldType::Textarea,
            "select" => FieldType::Select,
            "checkbox" => FieldType::Checkbox,
            "radio" => FieldType::Radio,
            _ => FieldType::Other(raw),
        }
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Postgres> for FieldType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for FieldType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(FieldType::from(raw))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Field {
    pub id: Uuid,
    pub form_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub options: Vec<String>,
    pub validation_regex: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// A field definition as supplied by an admin, before it belongs to a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInput {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    pub validation_regex: Option<String>,
}

impl FieldInput {
    /// Definition used when an unknown submission key is registered as a field.
    ///
    /// The type follows the first value seen, so the same payload keeps validating afterwards:
    /// strings become `text`, numbers `number`, booleans `checkbox`, anything else `json`.
    pub fn registered(name: &str, value: &Value) -> Self {
        let field_type = match value {
            Value::String(_) => FieldType::Text,
            Value::Number(_) => FieldType::Number,
            Value::Bool(_) => FieldType::Checkbox,
            _ => FieldType::Other(JSON_FIELD_TYPE.to_string()),
        };
        Self {
            name: name.to_string(),
            field_type,
            required: false,
            options: Vec::new(),
            validation_regex: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: Option<FieldType>,
    pub required: Option<bool>,
    pub options: Option<Vec<String>>,
    /// An empty string clears the pattern.
    pub validation_regex: Option<String>,
    pub position: Option<i32>,
}

impl FieldPatch {
    /// `None` leaves the pattern alone, `Some(None)` clears it.
    pub fn regex_update(&self) -> Option<Option<String>> {
        self.validation_regex
            .as_ref()
            .map(|re| if re.is_empty() { None } else { Some(re.clone()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_types_round_trip_as_strings() {
        assert_eq!(FieldType::from("select".to_string()), FieldType::Select);
        assert_eq!(FieldType::from("date".to_string()), FieldType::Other("date".to_string()));
        assert_eq!(String::from(FieldType::Other("date".to_string())), "date");

        let parsed: FieldInput = serde_json::from_value(serde_json::json!({
            "name": "color",
            "type": "select",
            "options": ["red", "blue"]
        }))
        .unwrap();
        assert_eq!(parsed.field_type, FieldType::Select);
        assert!(!parsed.required);
        assert_eq!(serde_json::to_value(&parsed).unwrap()["type"], "select");
    }

    #[test]
    fn registered_fields_take_their_type_from_the_value() {
        use serde_json::json;

        let typed = |v: Value| FieldInput::registered("k", &v).field_type;
        assert_eq!(typed(json!("x")), FieldType::Text);
        assert_eq!(typed(json!(5)), FieldType::Number);
        assert_eq!(typed(json!(true)), FieldType::Checkbox);
        assert_eq!(typed(json!([1, 2])), FieldType::Other(JSON_FIELD_TYPE.to_string()));
        assert_eq!(typed(Value::Null), FieldType::Other(JSON_FIELD_TYPE.to_string()));
    }
}
