//! Submission validation built from stored field metadata.
//!
//! [`SubmissionValidator::build`] turns a form's ordered fields into one [`FieldRule`] per field
//! plus an optional pattern refinement. [`SubmissionValidator::validate`] runs every rule and
//! collects all issues before reporting, so clients see each bad field at once.
pub mod definitions;
pub mod rules;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::UnknownFieldPolicy;
use crate::database::models::{Field, FieldInput};

pub use definitions::check_field_definitions;
pub use rules::FieldRule;

pub const REQUIRED: &str = "Required";
pub const MISCONFIGURED: &str = "Field is misconfigured";
pub const UNKNOWN_FIELD: &str = "Unknown field";

/// One failure, addressed by field name. The empty path means the payload itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Every issue found in one payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed: {} issue(s)", issues.len())]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![Issue::new(path, message)],
        }
    }

    pub fn mentions(&self, path: &str) -> bool {
        self.issues.iter().any(|i| i.path == path)
    }
}

#[derive(Debug, Clone)]
enum Pattern {
    Unset,
    Compiled(Regex),
    /// Stored pattern failed to compile; any value for the field is rejected.
    Broken,
}

#[derive(Debug, Clone)]
struct FieldValidator {
    name: String,
    required: bool,
    rule: FieldRule,
    pattern: Pattern,
}

impl FieldValidator {
    fn check(&self, value: Option<&Value>) -> Result<Option<Value>, String> {
        let value = match value {
            None | Some(Value::Null) if self.required => return Err(REQUIRED.to_string()),
            None | Some(Value::Null) => return Ok(None),
            Some(v) => v,
        };
        let normalized = self.rule.apply(value)?;
        match &self.pattern {
            Pattern::Unset => {}
            Pattern::Broken => return Err(MISCONFIGURED.to_string()),
            Pattern::Compiled(re) => {
                if !re.is_match(&rules::pattern_subject(&normalized)) {
                    return Err("Does not match the required pattern".to_string());
                }
            }
        }
        Ok(Some(normalized))
    }
}

/// Normalized payload ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub data: Map<String, Value>,
    /// Definitions for keys accepted under [`UnknownFieldPolicy::Register`] that have no field yet.
    pub new_fields: Vec<FieldInput>,
}

#[derive(Debug, Clone)]
pub struct SubmissionValidator {
    fields: Vec<FieldValidator>,
    unknown: UnknownFieldPolicy,
}

impl SubmissionValidator {
    pub fn build(fields: &[Field], unknown: UnknownFieldPolicy) -> Self {
        let fields = fields
            .iter()
            .map(|f| {
                let pattern = match f.validation_regex.as_deref() {
                    None | Some("") => Pattern::Unset,
                    Some(src) => match Regex::new(src) {
                        Ok(re) => Pattern::Compiled(re),
                        Err(err) => {
                            warn!(
                                "Field '{}' on form {} has an invalid pattern: {}",
                                f.name, f.form_id, err
                            );
                            Pattern::Broken
                        }
                    },
                };
                FieldValidator {
                    name: f.name.clone(),
                    required: f.required,
                    rule: FieldRule::for_field(&f.field_type, &f.options),
                    pattern,
                }
            })
            .collect();
        Self { fields, unknown }
    }

    pub fn validate(&self, payload: &Value) -> Result<Validated, ValidationReport> {
        let object = match payload {
            Value::Object(map) => map,
            _ => return Err(ValidationReport::single("", "Expected a JSON object")),
        };

        let mut issues = Vec::new();
        let mut data = Map::new();
        for field in &self.fields {
            match field.check(object.get(&field.name)) {
                Ok(Some(value)) => {
                    data.insert(field.name.clone(), value);
                }
                Ok(None) => {}
                Err(message) => issues.push(Issue::new(field.name.clone(), message)),
            }
        }

        let mut new_fields = Vec::new();
        for (key, value) in object {
            if self.fields.iter().any(|f| &f.name == key) {
                continue;
            }
            match self.unknown {
                UnknownFieldPolicy::Drop => {}
                UnknownFieldPolicy::Reject => issues.push(Issue::new(key.clone(), UNKNOWN_FIELD)),
                UnknownFieldPolicy::Register => {
                    if key.trim().is_empty() {
                        issues.push(Issue::new(key.clone(), UNKNOWN_FIELD));
                        continue;
                    }
                    data.insert(key.clone(), value.clone());
                    new_fields.push(FieldInput::registered(key, value));
                }
            }
        }

        if issues.is_empty() {
            Ok(Validated { data, new_fields })
        } else {
            Err(ValidationReport { issues })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::FieldType;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn field(name: &str, field_type: FieldType, required: bool) -> Field {
        Field {
            id: Uuid::new_v4(),
            form_id: Uuid::nil(),
            name: name.to_string(),
            field_type,
            required,
            options: vec![],
            validation_regex: None,
            position: 0,
            created_at: Utc::now(),
        }
    }

    fn contact_form() -> SubmissionValidator {
        SubmissionValidator::build(
            &[
                field("email", FieldType::Email, true),
                field("age", FieldType::Number, false),
            ],
            UnknownFieldPolicy::Drop,
        )
    }

    #[test]
    fn valid_payload_is_normalized() {
        let ok = contact_form().validate(&json!({"email": "a@b.com"})).unwrap();
        assert_eq!(Value::Object(ok.data), json!({"email": "a@b.com"}));

        let ok = contact_form()
            .validate(&json!({"email": "a@b.com", "age": "42"}))
            .unwrap();
        assert_eq!(ok.data["age"], json!(42));
    }

    #[test]
    fn bad_email_is_reported_on_its_path() {
        let err = contact_form()
            .validate(&json!({"email": "not-an-email"}))
            .unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.mentions("email"));
    }

    #[test]
    fn all_issues_are_collected() {
        let err = contact_form().validate(&json!({"age": "x"})).unwrap_err();
        assert!(err.mentions("email"));
        assert!(err.mentions("age"));
        let email = err.issues.iter().find(|i| i.path == "email").unwrap();
        assert_eq!(email.message, REQUIRED);
    }

    #[test]
    fn required_applies_to_accept_anything_types() {
        let v = SubmissionValidator::build(
            &[field("agree", FieldType::Checkbox, true)],
            UnknownFieldPolicy::Drop,
        );
        assert!(v.validate(&json!({})).unwrap_err().mentions("agree"));
        assert!(v.validate(&json!({"agree": null})).unwrap_err().mentions("agree"));
        assert!(v.validate(&json!({"agree": false})).is_ok());
    }

    #[test]
    fn optional_null_is_omitted() {
        let ok = contact_form()
            .validate(&json!({"email": "a@b.com", "age": null}))
            .unwrap();
        assert!(!ok.data.contains_key("age"));
    }

    #[test]
    fn non_object_payload_fails_at_root() {
        let err = contact_form().validate(&json!(["a"])).unwrap_err();
        assert_eq!(err.issues, vec![Issue::new("", "Expected a JSON object")]);
    }

    #[test]
    fn pattern_refines_after_base_rule() {
        let mut zip = field("zip", FieldType::Text, false);
        zip.validation_regex = Some(r"^\d{5}$".into());
        let v = SubmissionValidator::build(&[zip], UnknownFieldPolicy::Drop);
        assert!(v.validate(&json!({"zip": "12345"})).is_ok());
        assert!(v.validate(&json!({"zip": "1234"})).unwrap_err().mentions("zip"));
        assert!(v.validate(&json!({})).is_ok());
    }

    #[test]
    fn pattern_search_is_unanchored() {
        let mut code = field("code", FieldType::Number, false);
        code.validation_regex = Some("7".into());
        let v = SubmissionValidator::build(&[code], UnknownFieldPolicy::Drop);
        assert!(v.validate(&json!({"code": 170})).is_ok());
        assert!(v.validate(&json!({"code": "99"})).is_err());
    }

    #[test]
    fn broken_pattern_fails_closed() {
        let mut name = field("name", FieldType::Text, false);
        name.validation_regex = Some("([a-z".into());
        let v = SubmissionValidator::build(&[name], UnknownFieldPolicy::Drop);
        let err = v.validate(&json!({"name": "abc"})).unwrap_err();
        assert_eq!(err.issues, vec![Issue::new("name", MISCONFIGURED)]);
        assert!(v.validate(&json!({})).is_ok());
    }

    #[test]
    fn unknown_key_policies() {
        let fields = [field("email", FieldType::Email, false)];
        let payload = json!({"email": "a@b.com", "extra": "x"});

        let dropped = SubmissionValidator::build(&fields, UnknownFieldPolicy::Drop)
            .validate(&payload)
            .unwrap();
        assert!(!dropped.data.contains_key("extra"));

        let rejected = SubmissionValidator::build(&fields, UnknownFieldPolicy::Reject)
            .validate(&payload)
            .unwrap_err();
        assert_eq!(rejected.issues, vec![Issue::new("extra", UNKNOWN_FIELD)]);

        let registered = SubmissionValidator::build(&fields, UnknownFieldPolicy::Register)
            .validate(&payload)
            .unwrap();
        assert_eq!(registered.data["extra"], json!("x"));
        assert_eq!(registered.new_fields, vec![FieldInput::registered("extra", &json!("x"))]);
    }

    #[test]
    fn registered_keys_keep_validating_once_they_are_fields() {
        let payload = json!({"count": 5, "subscribed": true, "tags": ["a"]});
        let first = SubmissionValidator::build(&[], UnknownFieldPolicy::Register)
            .validate(&payload)
            .unwrap();
        assert_eq!(first.new_fields.len(), 3);

        let fields: Vec<Field> = first
            .new_fields
            .iter()
            .map(|input| {
                let mut f = field(&input.name, input.field_type.clone(), false);
                f.options = input.options.clone();
                f
            })
            .collect();
        let again = SubmissionValidator::build(&fields, UnknownFieldPolicy::Register)
            .validate(&payload)
            .unwrap();
        assert_eq!(again.data, first.data);
        assert!(again.new_fields.is_empty());
    }
}
