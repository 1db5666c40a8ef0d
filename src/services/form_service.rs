//! Tenant-scoped administration of forms, their fields and submissions.
//!
//! Every operation runs on behalf of a [`Principal`]: records outside its scope are refused
//! with 403, missing records are 404.
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{
    CreateFormRequest, DailyCount, Field, FieldInput, FieldPatch, FieldTemplate,
    FieldTemplateInput, FieldTemplatePatch, Form, FormDetail, FormPatch, NewForm, Page,
    PageRequest, Submission, UpdateFormRequest, ValueCount,
};
use crate::database::FormStore;
use crate::error::ApiError;
use crate::middleware::Principal;
use crate::validation::definitions::check_shape;
use crate::validation::rules::is_email;
use crate::validation::{check_field_definitions, Issue, ValidationReport};

pub const DEFAULT_DAYS: u32 = 30;
pub const MAX_DAYS: u32 = 365;
/// Key grouped by the value breakdown when none is named.
pub const DEFAULT_VALUE_FIELD: &str = "subject";

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub days: u32,
    pub since: NaiveDate,
    pub total: i64,
    pub counts: Vec<DailyCount>,
}

/// How one form's submissions split across the values of one data key.
#[derive(Debug, Clone, Serialize)]
pub struct ValueReport {
    pub field: String,
    /// Submissions carrying a non-null value for `field`.
    pub total: i64,
    pub counts: Vec<ValueCount>,
}

pub struct FormService<'a> {
    store: &'a dyn FormStore,
    principal: &'a Principal,
}

impl<'a> FormService<'a> {
    pub fn new(store: &'a dyn FormStore, principal: &'a Principal) -> Self {
        Self { store, principal }
    }

    pub async fn list_forms(&self) -> Result<Vec<FormDetail>, ApiError> {
        let forms = self.store.list_forms(self.principal.scope).await?;
        let mut details = Vec::with_capacity(forms.len());
        for form in forms {
            details.push(self.detail(form).await?);
        }
        Ok(details)
    }

    pub async fn get_form(&self, id: Uuid) -> Result<FormDetail, ApiError> {
        let form = self.owned_form(id).await?;
        self.detail(form).await
    }

    pub async fn create_form(&self, req: CreateFormRequest) -> Result<FormDetail, ApiError> {
        let tenant_id = match self.principal.scope {
            Some(scope) => scope,
            None => req
                .tenant_id
                .ok_or_else(|| ApiError::bad_request("tenant_id is required"))?,
        };
        // Unknown tenants surface as 404 rather than an FK failure.
        self.store.get_tenant(tenant_id).await?;

        let mut issues = Vec::new();
        let name = req.name.trim().to_string();
        if name.is_empty() {
            issues.push(Issue::new("name", "Form name is required"));
        }
        let slug = clean_optional(req.slug);
        issues.extend(slug_issues(slug.as_deref()));
        issues.extend(email_issues(&req.notify_emails));
        if let Err(report) = check_field_definitions(&req.fields) {
            issues.extend(report.issues);
        }
        reject(issues)?;

        let form = self
            .store
            .create_form(
                NewForm {
                    tenant_id,
                    name,
                    slug,
                    description: clean_optional(req.description),
                    notify_emails: clean_list(req.notify_emails),
                    allowed_origins: clean_list(req.allowed_origins),
                },
                req.fields,
            )
            .await?;
        info!("Created form {} for tenant {}", form.id, form.tenant_id);
        self.detail(form).await
    }

    /// A `fields` list in the request replaces every field of the form.
    pub async fn update_form(&self, id: Uuid, req: UpdateFormRequest) -> Result<FormDetail, ApiError> {
        self.owned_form(id).await?;

        let mut issues = Vec::new();
        let name = req.name.map(|n| n.trim().to_string());
        if name.as_deref() == Some("") {
            issues.push(Issue::new("name", "Form name is required"));
        }
        let slug = req.slug.map(|s| clean_optional(Some(s)));
        if let Some(Some(slug)) = &slug {
            issues.extend(slug_issues(Some(slug)));
        }
        if let Some(emails) = &req.notify_emails {
            issues.extend(email_issues(emails));
        }
        if let Some(fields) = &req.fields {
            if let Err(report) = check_field_definitions(fields) {
                issues.extend(report.issues);
            }
        }
        reject(issues)?;

        let patch = FormPatch {
            name,
            slug,
            description: req.description.map(|d| clean_optional(Some(d))),
            notify_emails: req.notify_emails.map(clean_list),
            allowed_origins: req.allowed_origins.map(clean_list),
        };
        let form = self.store.update_form(id, patch, req.fields).await?;
        info!("Updated form {}", form.id);
        self.detail(form).await
    }

    pub async fn delete_form(&self, id: Uuid) -> Result<(), ApiError> {
        self.owned_form(id).await?;
        self.store.delete_form(id).await?;
        info!("Deleted form {}", id);
        Ok(())
    }

    pub async fn list_fields(&self, form_id: Uuid) -> Result<Vec<Field>, ApiError> {
        self.owned_form(form_id).await?;
        Ok(self.store.list_fields(form_id).await?)
    }

    pub async fn append_fields(
        &self,
        form_id: Uuid,
        inputs: Vec<FieldInput>,
    ) -> Result<Vec<Field>, ApiError> {
        self.owned_form(form_id).await?;
        if inputs.is_empty() {
            return Err(ApiError::bad_request("At least one field is required"));
        }
        check_field_definitions(&inputs)?;
        let added = self.store.append_fields(form_id, inputs).await?;
        info!("Appended {} field(s) to form {}", added.len(), form_id);
        Ok(added)
    }

    /// The patch is merged onto the stored field before the shape checks run.
    pub async fn update_field(
        &self,
        form_id: Uuid,
        field_id: Uuid,
        patch: FieldPatch,
    ) -> Result<Field, ApiError> {
        self.owned_form(form_id).await?;
        let current = self
            .store
            .list_fields(form_id)
            .await?
            .into_iter()
            .find(|f| f.id == field_id)
            .ok_or_else(|| ApiError::not_found("Field not found"))?;

        let mut issues = Vec::new();
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                issues.push(Issue::new(current.name.as_str(), "Field name is required"));
            }
        }
        let regex = match patch.regex_update() {
            Some(update) => update,
            None => current.validation_regex.clone(),
        };
        issues.extend(check_shape(
            patch.name.as_deref().unwrap_or(&current.name),
            patch.field_type.as_ref().unwrap_or(&current.field_type),
            patch.options.as_deref().unwrap_or(&current.options),
            regex.as_deref(),
        ));
        reject(issues)?;

        Ok(self.store.update_field(form_id, field_id, patch).await?)
    }

    pub async fn delete_field(&self, form_id: Uuid, field_id: Uuid) -> Result<(), ApiError> {
        self.owned_form(form_id).await?;
        self.store.delete_field(form_id, field_id).await?;
        Ok(())
    }

    pub async fn list_submissions(
        &self,
        form_id: Uuid,
        page: PageRequest,
        keyword: Option<&str>,
    ) -> Result<Page<Submission>, ApiError> {
        self.owned_form(form_id).await?;
        let keyword = keyword.map(str::trim).filter(|k| !k.is_empty());
        Ok(self.store.list_submissions(form_id, page, keyword).await?)
    }

    pub async fn get_submission(&self, form_id: Uuid, id: Uuid) -> Result<Submission, ApiError> {
        self.owned_form(form_id).await?;
        Ok(self.store.get_submission(form_id, id).await?)
    }

    pub async fn delete_submission(&self, form_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        self.owned_form(form_id).await?;
        self.store.delete_submission(form_id, id).await?;
        info!("Deleted submission {} of form {}", id, form_id);
        Ok(())
    }

    pub async fn value_counts(
        &self,
        form_id: Uuid,
        field: Option<String>,
    ) -> Result<ValueReport, ApiError> {
        let form = self.owned_form(form_id).await?;
        let field = match field.as_deref().map(str::trim) {
            None => DEFAULT_VALUE_FIELD.to_string(),
            Some("") => return Err(ApiError::bad_request("field must not be empty")),
            Some(name) => name.to_string(),
        };
        let counts = self.store.value_counts(form.id, &field).await?;
        Ok(ValueReport {
            total: counts.iter().map(|c| c.count).sum(),
            field,
            counts,
        })
    }

    /// Counts per UTC day, today included, over the last `days` days.
    pub async fn daily(&self, days: Option<u32>) -> Result<DailyReport, ApiError> {
        let days = days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS);
        let today = Utc::now().date_naive();
        let since = today - Duration::days(i64::from(days) - 1);
        let start = since.and_time(NaiveTime::MIN).and_utc();

        let counts = self.store.daily_counts(self.principal.scope, start).await?;
        Ok(DailyReport {
            days,
            since,
            total: counts.iter().map(|c| c.count).sum(),
            counts,
        })
    }

    async fn owned_form(&self, id: Uuid) -> Result<Form, ApiError> {
        let form = self.store.get_form(id).await?;
        self.principal.authorize(form.tenant_id)?;
        Ok(form)
    }

    async fn detail(&self, form: Form) -> Result<FormDetail, ApiError> {
        let fields = self.store.list_fields(form.id).await?;
        let submissions_count = self.store.count_submissions(form.id).await?;
        Ok(FormDetail {
            form,
            fields,
            submissions_count,
        })
    }
}

/// Field templates are global; only their shape is checked here.
pub async fn create_template(
    store: &dyn FormStore,
    input: FieldTemplateInput,
) -> Result<FieldTemplate, ApiError> {
    let mut issues = Vec::new();
    if input.name.trim().is_empty() {
        issues.push(Issue::new("name", "Template name is required"));
    }
    issues.extend(check_shape(
        "template",
        &input.field_type,
        &input.options,
        input.validation_regex.as_deref(),
    ));
    reject(issues)?;
    Ok(store.create_field_template(input).await?)
}

pub async fn update_template(
    store: &dyn FormStore,
    id: Uuid,
    patch: FieldTemplatePatch,
) -> Result<FieldTemplate, ApiError> {
    let current = store
        .list_field_templates()
        .await?
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| ApiError::not_found("Field template not found"))?;

    let regex = match patch.regex_update() {
        Some(update) => update,
        None => current.validation_regex.clone(),
    };
    let mut issues = check_shape(
        "template",
        patch.field_type.as_ref().unwrap_or(&current.field_type),
        patch.options.as_deref().unwrap_or(&current.options),
        regex.as_deref(),
    );
    if patch.name.as_deref().map_or(false, |n| n.trim().is_empty()) {
        issues.push(Issue::new("name", "Template name is required"));
    }
    reject(issues)?;
    Ok(store.update_field_template(id, patch).await?)
}

fn reject(issues: Vec<Issue>) -> Result<(), ValidationReport> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationReport { issues })
    }
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn slug_issues(slug: Option<&str>) -> Option<Issue> {
    let slug = slug?;
    let valid = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    // A slug that parses as a UUID would be shadowed by id lookups on the public API.
    if !valid || Uuid::parse_str(slug).is_ok() {
        Some(Issue::new(
            "slug",
            "Slug may only contain lowercase letters, digits, hyphens and underscores",
        ))
    } else {
        None
    }
}

fn email_issues(emails: &[String]) -> Vec<Issue> {
    emails
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.trim().is_empty() && !is_email(e.trim()))
        .map(|(i, _)| Issue::new(format!("notify_emails[{}]", i), "Invalid email address"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{FieldType, NewSubmission, Role};
    use crate::database::{MemoryStore, NewTenant};
    use crate::middleware::AuthMethod;
    use serde_json::json;

    async fn tenant(store: &MemoryStore, name: &str) -> Uuid {
        store
            .create_tenant(NewTenant {
                name: name.into(),
                domain: None,
                allowed_origins: vec![],
                api_key_hash: format!("hash-{}", name),
            })
            .await
            .unwrap()
            .id
    }

    fn member_of(tenant_id: Uuid) -> Principal {
        Principal {
            user_id: Some(Uuid::new_v4()),
            role: Role::User,
            tenant_id: Some(tenant_id),
            scope: Some(tenant_id),
            impersonating: false,
            method: AuthMethod::Bearer,
        }
    }

    fn admin() -> Principal {
        Principal {
            user_id: Some(Uuid::new_v4()),
            role: Role::Admin,
            tenant_id: None,
            scope: None,
            impersonating: false,
            method: AuthMethod::Bearer,
        }
    }

    fn field(name: &str, field_type: FieldType) -> FieldInput {
        FieldInput {
            name: name.into(),
            field_type,
            required: false,
            options: vec![],
            validation_regex: None,
        }
    }

    fn contact_form(fields: Vec<FieldInput>) -> CreateFormRequest {
        CreateFormRequest {
            tenant_id: None,
            name: "Contact".into(),
            slug: Some("contact".into()),
            description: None,
            notify_emails: vec![],
            allowed_origins: vec![],
            fields,
        }
    }

    #[tokio::test]
    async fn users_cannot_reach_other_tenants_forms() {
        let store = MemoryStore::new();
        let acme = tenant(&store, "acme").await;
        let globex = tenant(&store, "globex").await;

        let acme_user = member_of(acme);
        let created = FormService::new(&store, &acme_user)
            .create_form(contact_form(vec![field("email", FieldType::Email)]))
            .await
            .unwrap();
        assert_eq!(created.form.tenant_id, acme);
        assert_eq!(created.fields.len(), 1);

        let globex_user = member_of(globex);
        let service = FormService::new(&store, &globex_user);
        let err = service.get_form(created.form.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(service.list_forms().await.unwrap().is_empty());

        let root = admin();
        assert_eq!(FormService::new(&store, &root).list_forms().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unscoped_admin_must_name_a_tenant() {
        let store = MemoryStore::new();
        let acme = tenant(&store, "acme").await;
        let root = admin();
        let service = FormService::new(&store, &root);

        let err = service.create_form(contact_form(vec![])).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let mut req = contact_form(vec![]);
        req.tenant_id = Some(acme);
        assert!(service.create_form(req).await.is_ok());
    }

    #[tokio::test]
    async fn field_writes_are_validated() {
        let store = MemoryStore::new();
        let acme = tenant(&store, "acme").await;
        let user = member_of(acme);
        let service = FormService::new(&store, &user);

        let bad = service
            .create_form(contact_form(vec![field("plan", FieldType::Select)]))
            .await
            .unwrap_err();
        assert_eq!(bad.error_code(), "VALIDATION_ERROR");

        let form = service
            .create_form(contact_form(vec![field("email", FieldType::Email)]))
            .await
            .unwrap();
        let dup = service
            .append_fields(form.form.id, vec![field("email", FieldType::Text)])
            .await
            .unwrap_err();
        assert_eq!(dup.status_code(), 409);

        let email_id = form.fields[0].id;
        let broken = service
            .update_field(
                form.form.id,
                email_id,
                FieldPatch {
                    validation_regex: Some("(".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(broken.status_code(), 400);
    }

    #[tokio::test]
    async fn daily_report_is_clamped_and_totalled() {
        let store = MemoryStore::new();
        let acme = tenant(&store, "acme").await;
        let user = member_of(acme);
        let service = FormService::new(&store, &user);
        let form = service.create_form(contact_form(vec![])).await.unwrap();
        for _ in 0..3 {
            store
                .insert_submission(NewSubmission {
                    form_id: form.form.id,
                    tenant_id: acme,
                    ip: "0.0.0.0".into(),
                    user_agent: "-".into(),
                    data: json!({}),
                })
                .await
                .unwrap();
        }

        let report = service.daily(Some(5000)).await.unwrap();
        assert_eq!(report.days, MAX_DAYS);
        assert_eq!(report.total, 3);
        assert_eq!(report.counts.len(), 1);
        assert_eq!(report.counts[0].day, Utc::now().date_naive());

        assert_eq!(service.daily(None).await.unwrap().days, DEFAULT_DAYS);
    }

    #[test]
    fn slugs_must_not_look_like_ids() {
        assert!(slug_issues(Some("contact-us")).is_none());
        assert!(slug_issues(Some("Contact Us")).is_some());
        assert!(slug_issues(Some(&Uuid::new_v4().to_string())).is_some());
    }
}
