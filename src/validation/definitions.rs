// validation/definitions.rs - checks on field definitions written through the admin API
use std::collections::HashSet;

use regex::Regex;

use super::{Issue, ValidationReport};
use crate::database::models::{FieldInput, FieldType};

/// Validate a batch of definitions before they reach the store.
///
/// Names must be non-empty and unique within the batch, `select` needs options, and patterns must
/// compile. Clashes with fields already on the form are left to the store (409).
pub fn check_field_definitions(inputs: &[FieldInput]) -> Result<(), ValidationReport> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for (index, input) in inputs.iter().enumerate() {
        let path = if input.name.trim().is_empty() {
            format!("fields[{}]", index)
        } else {
            input.name.clone()
        };

        if input.name.trim().is_empty() {
            issues.push(Issue::new(path.clone(), "Field name is required"));
        } else if !seen.insert(input.name.as_str()) {
            issues.push(Issue::new(path.clone(), "Duplicate field name"));
        }

        issues.extend(check_shape(
            &path,
            &input.field_type,
            &input.options,
            input.validation_regex.as_deref(),
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationReport { issues })
    }
}

/// Type/option/pattern checks shared by fields, field patches and templates.
pub fn check_shape(
    path: &str,
    field_type: &FieldType,
    options: &[String],
    validation_regex: Option<&str>,
) -> Vec<Issue> {
    let mut issues = Vec::new();
    if field_type.as_str().trim().is_empty() {
        issues.push(Issue::new(path, "Field type is required"));
    }
    if *field_type == FieldType::Select && options.is_empty() {
        issues.push(Issue::new(path, "Select fields need at least one option"));
    }
    if let Some(src) = validation_regex.filter(|s| !s.is_empty()) {
        if let Err(err) = Regex::new(src) {
            issues.push(Issue::new(path, format!("Invalid validation pattern: {}", err)));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, field_type: FieldType) -> FieldInput {
        FieldInput {
            name: name.into(),
            field_type,
            required: false,
            options: vec![],
            validation_regex: None,
        }
    }

    #[test]
    fn accepts_well_formed_definitions() {
        let mut color = input("color", FieldType::Select);
        color.options = vec!["red".into()];
        let mut zip = input("zip", FieldType::Text);
        zip.validation_regex = Some(r"^\d{5}$".into());
        assert!(check_field_definitions(&[color, zip, input("notes", FieldType::Textarea)]).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut broken = input("zip", FieldType::Text);
        broken.validation_regex = Some("([".into());
        let report = check_field_definitions(&[
            input("", FieldType::Text),
            input("a", FieldType::Text),
            input("a", FieldType::Text),
            input("pick", FieldType::Select),
            broken,
        ])
        .unwrap_err();
        assert!(report.mentions("fields[0]"));
        assert!(report.mentions("a"));
        assert!(report.mentions("pick"));
        assert!(report.mentions("zip"));
        assert_eq!(report.issues.len(), 4);
    }
}
