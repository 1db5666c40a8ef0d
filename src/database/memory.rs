//! In-memory implementation of [`FormStore`].
//!
//! Every table lives in one `Tables` value behind a single `tokio::sync::RwLock`, so multi-table
//! operations (cascading deletes, field replacement) are atomic with respect to other requests.
//! Nothing is durable; this backend serves development and the test suite.
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{
    data_contains, DailyCount, Field, FieldInput, FieldPatch, FieldTemplate, FieldTemplateInput,
    FieldTemplatePatch, Form, FormPatch, NewForm, NewSubmission, NewUser, Page, PageRequest,
    RefreshToken, Submission, Tenant, TenantPatch, User, UserPatch, ValueCount,
};
use super::store::{FormStore, NewTenant, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    tenants: HashMap<Uuid, Tenant>,
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<String, RefreshToken>,
    forms: HashMap<Uuid, Form>,
    fields: HashMap<Uuid, Field>,
    field_templates: HashMap<Uuid, FieldTemplate>,
    submissions: HashMap<Uuid, Submission>,
}

impl Tables {
    fn fields_of(&self, form_id: Uuid) -> Vec<Field> {
        let mut fields: Vec<Field> = self
            .fields
            .values()
            .filter(|f| f.form_id == form_id)
            .cloned()
            .collect();
        fields.sort_by(|a, b| a.position.cmp(&b.position).then(a.created_at.cmp(&b.created_at)));
        fields
    }

    fn slug_taken(&self, tenant_id: Uuid, slug: &str, except: Option<Uuid>) -> bool {
        self.forms.values().any(|f| {
            f.tenant_id == tenant_id && f.slug.as_deref() == Some(slug) && Some(f.id) != except
        })
    }

    /// Inserts `inputs` after the form's current fields, rejecting names already in use.
    fn push_fields(&mut self, form_id: Uuid, inputs: Vec<FieldInput>) -> StoreResult<Vec<Field>> {
        let existing = self.fields_of(form_id);
        let mut next_position = existing.last().map(|f| f.position + 1).unwrap_or(0);
        let mut names: Vec<String> = existing.into_iter().map(|f| f.name).collect();

        for input in &inputs {
            if names.contains(&input.name) {
                return Err(StoreError::Conflict(format!(
                    "field '{}' already exists on this form",
                    input.name
                )));
            }
            names.push(input.name.clone());
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            let field = Field {
                id: Uuid::new_v4(),
                form_id,
                name: input.name,
                field_type: input.field_type,
                required: input.required,
                options: input.options,
                validation_regex: input.validation_regex,
                position: next_position,
                created_at: now,
            };
            next_position += 1;
            self.fields.insert(field.id, field.clone());
            created.push(field);
        }
        Ok(created)
    }

    fn insert_user(&mut self, user: NewUser) -> StoreResult<User> {
        if self.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email '{}' already registered",
                user.email
            )));
        }
        if let Some(tenant_id) = user.tenant_id {
            if !self.tenants.contains_key(&tenant_id) {
                return Err(not_found("tenant", tenant_id));
            }
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
            tenant_id: user.tenant_id,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(created.id, created.clone());
        Ok(created)
    }

    fn remove_form(&mut self, form_id: Uuid) {
        self.forms.remove(&form_id);
        self.fields.retain(|_, f| f.form_id != form_id);
        self.submissions.retain(|_, s| s.form_id != form_id);
    }
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(what: &str, id: Uuid) -> StoreError {
    StoreError::NotFound(format!("{} {}", what, id))
}

#[async_trait]
impl FormStore for MemoryStore {
    async fn list_tenants(&self) -> StoreResult<Vec<Tenant>> {
        let tables = self.tables.read().await;
        let mut tenants: Vec<Tenant> = tables.tenants.values().cloned().collect();
        tenants.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tenants)
    }

    async fn get_tenant(&self, id: Uuid) -> StoreResult<Tenant> {
        let tables = self.tables.read().await;
        tables
            .tenants
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("tenant", id))
    }

    async fn find_tenant_by_api_key_hash(&self, hash: &str) -> StoreResult<Option<Tenant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tenants
            .values()
            .find(|t| t.api_key_hash == hash)
            .cloned())
    }

    async fn create_tenant(&self, tenant: NewTenant) -> StoreResult<Tenant> {
        let mut tables = self.tables.write().await;
        if tables.tenants.values().any(|t| t.name == tenant.name) {
            return Err(StoreError::Conflict(format!(
                "tenant '{}' already exists",
                tenant.name
            )));
        }
        let now = Utc::now();
        let created = Tenant {
            id: Uuid::new_v4(),
            name: tenant.name,
            domain: tenant.domain,
            allowed_origins: tenant.allowed_origins,
            api_key_hash: tenant.api_key_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.tenants.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_tenant(&self, id: Uuid, patch: TenantPatch) -> StoreResult<Tenant> {
        let mut tables = self.tables.write().await;
        if let Some(name) = &patch.name {
            if tables.tenants.values().any(|t| &t.name == name && t.id != id) {
                return Err(StoreError::Conflict(format!("tenant '{}' already exists", name)));
            }
        }
        let tenant = tables
            .tenants
            .get_mut(&id)
            .ok_or_else(|| not_found("tenant", id))?;
        if let Some(name) = patch.name {
            tenant.name = name;
        }
        if let Some(domain) = patch.domain {
            tenant.domain = if domain.is_empty() { None } else { Some(domain) };
        }
        if let Some(origins) = patch.allowed_origins {
            tenant.allowed_origins = origins;
        }
        if let Some(active) = patch.is_active {
            tenant.is_active = active;
        }
        tenant.updated_at = Utc::now();
        Ok(tenant.clone())
    }

    async fn set_tenant_api_key_hash(&self, id: Uuid, hash: String) -> StoreResult<Tenant> {
        let mut tables = self.tables.write().await;
        let tenant = tables
            .tenants
            .get_mut(&id)
            .ok_or_else(|| not_found("tenant", id))?;
        tenant.api_key_hash = hash;
        tenant.updated_at = Utc::now();
        Ok(tenant.clone())
    }

    async fn delete_tenant(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.tenants.remove(&id).is_none() {
            return Err(not_found("tenant", id));
        }
        let form_ids: Vec<Uuid> = tables
            .forms
            .values()
            .filter(|f| f.tenant_id == id)
            .map(|f| f.id)
            .collect();
        for form_id in form_ids {
            tables.remove_form(form_id);
        }
        let user_ids: Vec<Uuid> = tables
            .users
            .values()
            .filter(|u| u.tenant_id == Some(id))
            .map(|u| u.id)
            .collect();
        tables.users.retain(|_, u| u.tenant_id != Some(id));
        tables
            .refresh_tokens
            .retain(|_, t| !user_ids.contains(&t.user_id));
        Ok(())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("user", id))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.tables.write().await.insert_user(user)
    }

    async fn create_first_admin(&self, user: NewUser) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if !tables.users.is_empty() {
            return Ok(None);
        }
        tables.insert_user(user).map(Some)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if let Some(Some(tenant_id)) = patch.tenant_id {
            if !tables.tenants.contains_key(&tenant_id) {
                return Err(not_found("tenant", tenant_id));
            }
        }
        let user = tables.users.get_mut(&id).ok_or_else(|| not_found("user", id))?;
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(tenant_id) = patch.tenant_id {
            user.tenant_id = tenant_id;
        }
        if let Some(active) = patch.is_active {
            user.is_active = active;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or_else(|| not_found("user", id))?;
        user.last_login_at = Some(at);
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(not_found("user", id));
        }
        tables.refresh_tokens.retain(|_, t| t.user_id != id);
        Ok(())
    }

    async fn insert_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshToken> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(not_found("user", user_id));
        }
        if tables.refresh_tokens.contains_key(&token_hash) {
            return Err(StoreError::Conflict("refresh token already exists".into()));
        }
        let token = RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.clone(),
            expires_at,
            created_at: Utc::now(),
        };
        tables.refresh_tokens.insert(token_hash, token.clone());
        Ok(token)
    }

    async fn find_refresh_token(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(self.tables.read().await.refresh_tokens.get(token_hash).cloned())
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(self
            .tables
            .write()
            .await
            .refresh_tokens
            .remove(token_hash)
            .is_some())
    }

    async fn delete_expired_refresh_tokens(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.refresh_tokens.len();
        tables
            .refresh_tokens
            .retain(|_, t| !(t.user_id == user_id && t.expires_at <= now));
        Ok((before - tables.refresh_tokens.len()) as u64)
    }

    async fn list_forms(&self, tenant_id: Option<Uuid>) -> StoreResult<Vec<Form>> {
        let tables = self.tables.read().await;
        let mut forms: Vec<Form> = tables
            .forms
            .values()
            .filter(|f| tenant_id.map_or(true, |t| f.tenant_id == t))
            .cloned()
            .collect();
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(forms)
    }

    async fn get_form(&self, id: Uuid) -> StoreResult<Form> {
        let tables = self.tables.read().await;
        tables.forms.get(&id).cloned().ok_or_else(|| not_found("form", id))
    }

    async fn find_form_by_slug(&self, tenant_id: Uuid, slug: &str) -> StoreResult<Option<Form>> {
        let tables = self.tables.read().await;
        Ok(tables
            .forms
            .values()
            .find(|f| f.tenant_id == tenant_id && f.slug.as_deref() == Some(slug))
            .cloned())
    }

    async fn create_form(&self, form: NewForm, fields: Vec<FieldInput>) -> StoreResult<Form> {
        let mut tables = self.tables.write().await;
        if !tables.tenants.contains_key(&form.tenant_id) {
            return Err(not_found("tenant", form.tenant_id));
        }
        if let Some(slug) = &form.slug {
            if tables.slug_taken(form.tenant_id, slug, None) {
                return Err(StoreError::Conflict(format!("slug '{}' already in use", slug)));
            }
        }
        let now = Utc::now();
        let created = Form {
            id: Uuid::new_v4(),
            tenant_id: form.tenant_id,
            name: form.name,
            slug: form.slug,
            description: form.description,
            notify_emails: form.notify_emails,
            allowed_origins: form.allowed_origins,
            created_at: now,
            updated_at: now,
        };
        tables.forms.insert(created.id, created.clone());
        if let Err(err) = tables.push_fields(created.id, fields) {
            tables.remove_form(created.id);
            return Err(err);
        }
        Ok(created)
    }

    async fn update_form(
        &self,
        id: Uuid,
        patch: FormPatch,
        fields: Option<Vec<FieldInput>>,
    ) -> StoreResult<Form> {
        let mut tables = self.tables.write().await;
        let current = tables.forms.get(&id).cloned().ok_or_else(|| not_found("form", id))?;
        if let Some(Some(slug)) = &patch.slug {
            if tables.slug_taken(current.tenant_id, slug, Some(id)) {
                return Err(StoreError::Conflict(format!("slug '{}' already in use", slug)));
            }
        }

        if let Some(inputs) = fields {
            let previous: Vec<(Uuid, Field)> = tables
                .fields
                .iter()
                .filter(|(_, f)| f.form_id == id)
                .map(|(k, f)| (*k, f.clone()))
                .collect();
            tables.fields.retain(|_, f| f.form_id != id);
            if let Err(err) = tables.push_fields(id, inputs) {
                tables.fields.retain(|_, f| f.form_id != id);
                tables.fields.extend(previous);
                return Err(err);
            }
        }

        let form = tables
            .forms
            .get_mut(&id)
            .ok_or_else(|| not_found("form", id))?;
        if let Some(name) = patch.name {
            form.name = name;
        }
        if let Some(slug) = patch.slug {
            form.slug = slug;
        }
        if let Some(description) = patch.description {
            form.description = description;
        }
        if let Some(emails) = patch.notify_emails {
            form.notify_emails = emails;
        }
        if let Some(origins) = patch.allowed_origins {
            form.allowed_origins = origins;
        }
        form.updated_at = Utc::now();
        Ok(form.clone())
    }

    async fn delete_form(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.forms.contains_key(&id) {
            return Err(not_found("form", id));
        }
        tables.remove_form(id);
        Ok(())
    }

    async fn list_fields(&self, form_id: Uuid) -> StoreResult<Vec<Field>> {
        Ok(self.tables.read().await.fields_of(form_id))
    }

    async fn append_fields(&self, form_id: Uuid, fields: Vec<FieldInput>) -> StoreResult<Vec<Field>> {
        let mut tables = self.tables.write().await;
        if !tables.forms.contains_key(&form_id) {
            return Err(not_found("form", form_id));
        }
        tables.push_fields(form_id, fields)
    }

    async fn update_field(
        &self,
        form_id: Uuid,
        field_id: Uuid,
        patch: FieldPatch,
    ) -> StoreResult<Field> {
        let mut tables = self.tables.write().await;
        if let Some(name) = &patch.name {
            let clash = tables
                .fields
                .values()
                .any(|f| f.form_id == form_id && &f.name == name && f.id != field_id);
            if clash {
                return Err(StoreError::Conflict(format!(
                    "field '{}' already exists on this form",
                    name
                )));
            }
        }
        let regex = patch.regex_update();
        let field = tables
            .fields
            .get_mut(&field_id)
            .filter(|f| f.form_id == form_id)
            .ok_or_else(|| not_found("field", field_id))?;
        if let Some(name) = patch.name {
            field.name = name;
        }
        if let Some(field_type) = patch.field_type {
            field.field_type = field_type;
        }
        if let Some(required) = patch.required {
            field.required = required;
        }
        if let Some(options) = patch.options {
            field.options = options;
        }
        if let Some(regex) = regex {
            field.validation_regex = regex;
        }
        if let Some(position) = patch.position {
            field.position = position;
        }
        Ok(field.clone())
    }

    async fn delete_field(&self, form_id: Uuid, field_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.fields.get(&field_id) {
            Some(f) if f.form_id == form_id => {
                tables.fields.remove(&field_id);
                Ok(())
            }
            _ => Err(not_found("field", field_id)),
        }
    }

    async fn list_field_templates(&self) -> StoreResult<Vec<FieldTemplate>> {
        let tables = self.tables.read().await;
        let mut templates: Vec<FieldTemplate> = tables.field_templates.values().cloned().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    async fn create_field_template(&self, input: FieldTemplateInput) -> StoreResult<FieldTemplate> {
        let mut tables = self.tables.write().await;
        let template = FieldTemplate {
            id: Uuid::new_v4(),
            name: input.name,
            field_type: input.field_type,
            required: input.required,
            options: input.options,
            validation_regex: input.validation_regex,
            created_at: Utc::now(),
        };
        tables.field_templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn update_field_template(
        &self,
        id: Uuid,
        patch: FieldTemplatePatch,
    ) -> StoreResult<FieldTemplate> {
        let mut tables = self.tables.write().await;
        let regex = patch.regex_update();
        let template = tables
            .field_templates
            .get_mut(&id)
            .ok_or_else(|| not_found("field template", id))?;
        if let Some(name) = patch.name {
            template.name = name;
        }
        if let Some(field_type) = patch.field_type {
            template.field_type = field_type;
        }
        if let Some(required) = patch.required {
            template.required = required;
        }
        if let Some(options) = patch.options {
            template.options = options;
        }
        if let Some(regex) = regex {
            template.validation_regex = regex;
        }
        Ok(template.clone())
    }

    async fn delete_field_template(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .field_templates
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("field template", id))
    }

    async fn insert_submission(&self, submission: NewSubmission) -> StoreResult<Submission> {
        let mut tables = self.tables.write().await;
        if !tables.forms.contains_key(&submission.form_id) {
            return Err(not_found("form", submission.form_id));
        }
        let stored = Submission {
            id: Uuid::new_v4(),
            form_id: submission.form_id,
            tenant_id: submission.tenant_id,
            ip: submission.ip,
            user_agent: submission.user_agent,
            data: submission.data,
            created_at: Utc::now(),
        };
        tables.submissions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_submissions(
        &self,
        form_id: Uuid,
        page: PageRequest,
        keyword: Option<&str>,
    ) -> StoreResult<Page<Submission>> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Submission> = tables
            .submissions
            .values()
            .filter(|s| s.form_id == form_id)
            .filter(|s| keyword.map_or(true, |k| data_contains(&s.data, k)))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .cloned()
            .collect();
        Ok(Page {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    async fn get_submission(&self, form_id: Uuid, id: Uuid) -> StoreResult<Submission> {
        let tables = self.tables.read().await;
        tables
            .submissions
            .get(&id)
            .filter(|s| s.form_id == form_id)
            .cloned()
            .ok_or_else(|| not_found("submission", id))
    }

    async fn delete_submission(&self, form_id: Uuid, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.submissions.get(&id) {
            Some(s) if s.form_id == form_id => {
                tables.submissions.remove(&id);
                Ok(())
            }
            _ => Err(not_found("submission", id)),
        }
    }

    async fn count_submissions(&self, form_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .submissions
            .values()
            .filter(|s| s.form_id == form_id)
            .count() as i64)
    }

    async fn value_counts(&self, form_id: Uuid, field: &str) -> StoreResult<Vec<ValueCount>> {
        let tables = self.tables.read().await;
        // Keyed by JSON text; `Value` has no ordering of its own.
        let mut groups: BTreeMap<String, ValueCount> = BTreeMap::new();
        for submission in tables.submissions.values() {
            if submission.form_id != form_id {
                continue;
            }
            let value = match submission.data.get(field) {
                Some(Value::Null) | None => continue,
                Some(value) => value,
            };
            groups
                .entry(value.to_string())
                .or_insert_with(|| ValueCount {
                    value: value.clone(),
                    count: 0,
                })
                .count += 1;
        }
        let mut counts: Vec<ValueCount> = groups.into_values().collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(counts)
    }

    async fn daily_counts(
        &self,
        tenant_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<DailyCount>> {
        let tables = self.tables.read().await;
        let mut days: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for submission in tables.submissions.values() {
            if submission.created_at < since {
                continue;
            }
            if tenant_id.map_or(false, |t| submission.tenant_id != t) {
                continue;
            }
            *days.entry(submission.created_at.date_naive()).or_default() += 1;
        }
        Ok(days
            .into_iter()
            .map(|(day, count)| DailyCount { day, count })
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        let _tables = self.tables.read().await;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
