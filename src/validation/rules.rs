// validation/rules.rs - per-type field rules
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

use crate::database::models::FieldType;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("valid email regex")
});

/// Base rule for one field, selected by its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRule {
    Email,
    Number,
    Text,
    Select(Vec<String>),
    /// checkbox, radio and unrecognised types
    Any,
}

impl FieldRule {
    pub fn for_field(field_type: &FieldType, options: &[String]) -> Self {
        match field_type {
            FieldType::Email => FieldRule::Email,
            FieldType::Number => FieldRule::Number,
            FieldType::Text | FieldType::Textarea => FieldRule::Text,
            FieldType::Select => FieldRule::Select(options.to_vec()),
            FieldType::Checkbox | FieldType::Radio | FieldType::Other(_) => FieldRule::Any,
        }
    }

    /// Check a present, non-null value and return its normalized form.
    pub fn apply(&self, value: &Value) -> Result<Value, String> {
        match self {
            FieldRule::Any => Ok(value.clone()),
            FieldRule::Text => match value {
                Value::String(_) => Ok(value.clone()),
                _ => Err("Expected string".to_string()),
            },
            FieldRule::Email => match value {
                Value::String(s) if is_email(s) => Ok(value.clone()),
                Value::String(_) => Err("Invalid email address".to_string()),
                _ => Err("Expected string".to_string()),
            },
            FieldRule::Number => coerce_number(value).ok_or_else(|| "Expected number".to_string()),
            FieldRule::Select(options) => match value {
                Value::String(s) if options.iter().any(|o| o == s) => Ok(value.clone()),
                _ => Err(format!("Expected one of: {}", options.join(", "))),
            },
        }
    }
}

pub fn is_email(candidate: &str) -> bool {
    candidate.len() <= 254 && EMAIL_RE.is_match(candidate)
}

/// Numbers pass through; numeric strings are trimmed and parsed, integers first.
fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Ok(int) = trimmed.parse::<i64>() {
                return Some(Value::Number(int.into()));
            }
            let float = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
            if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
                return Some(Value::Number((float as i64).into()));
            }
            Number::from_f64(float).map(Value::Number)
        }
        _ => None,
    }
}

/// Text a pattern is matched against: strings verbatim, everything else as JSON.
pub fn pattern_subject(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_rule_coerces_strings() {
        let rule = FieldRule::Number;
        assert_eq!(rule.apply(&json!("42")).unwrap(), json!(42));
        assert_eq!(rule.apply(&json!(" 2.5 ")).unwrap(), json!(2.5));
        assert_eq!(rule.apply(&json!("1e3")).unwrap(), json!(1000));
        assert_eq!(rule.apply(&json!(7)).unwrap(), json!(7));
        assert!(rule.apply(&json!("abc")).is_err());
        assert!(rule.apply(&json!("")).is_err());
        assert!(rule.apply(&json!("inf")).is_err());
        assert!(rule.apply(&json!(true)).is_err());
    }

    #[test]
    fn email_rule() {
        assert!(FieldRule::Email.apply(&json!("a@b.com")).is_ok());
        assert!(FieldRule::Email.apply(&json!("not-an-email")).is_err());
        assert!(FieldRule::Email.apply(&json!("a@b")).is_err());
        assert!(FieldRule::Email.apply(&json!(5)).is_err());
    }

    #[test]
    fn select_rule_is_exact() {
        let rule = FieldRule::for_field(&FieldType::Select, &["red".into(), "blue".into()]);
        assert!(rule.apply(&json!("red")).is_ok());
        assert!(rule.apply(&json!("Red")).is_err());
        assert!(rule.apply(&json!("green")).is_err());
    }

    #[test]
    fn unknown_types_accept_anything() {
        let rule = FieldRule::for_field(&FieldType::Other("date".into()), &[]);
        assert_eq!(rule, FieldRule::Any);
        assert_eq!(rule.apply(&json!({"a": 1})).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn pattern_subject_stringifies() {
        assert_eq!(pattern_subject(&json!("x")), "x");
        assert_eq!(pattern_subject(&json!(42)), "42");
        assert_eq!(pattern_subject(&json!(true)), "true");
    }
}
