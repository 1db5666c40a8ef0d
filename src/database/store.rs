use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::models::{
    DailyCount, Field, FieldInput, FieldPatch, FieldTemplate, FieldTemplateInput,
    FieldTemplatePatch, Form, FormPatch, NewForm, NewSubmission, NewUser, Page, PageRequest,
    RefreshToken, Submission, Tenant, TenantPatch, User, UserPatch, ValueCount,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Tenant insert; the caller generates the API key and passes only its hash.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub domain: Option<String>,
    pub allowed_origins: Vec<String>,
    pub api_key_hash: String,
}

/// Persistence for every entity of the service.
///
/// Tenant scoping is not enforced here; callers pass `Some(tenant_id)` to narrow list queries
/// and check ownership of single records themselves.
#[async_trait]
pub trait FormStore: Send + Sync {
    async fn list_tenants(&self) -> StoreResult<Vec<Tenant>>;
    async fn get_tenant(&self, id: Uuid) -> StoreResult<Tenant>;
    async fn find_tenant_by_api_key_hash(&self, hash: &str) -> StoreResult<Option<Tenant>>;
    async fn create_tenant(&self, tenant: NewTenant) -> StoreResult<Tenant>;
    async fn update_tenant(&self, id: Uuid, patch: TenantPatch) -> StoreResult<Tenant>;
    async fn set_tenant_api_key_hash(&self, id: Uuid, hash: String) -> StoreResult<Tenant>;
    /// Removes the tenant with its forms, fields, submissions and bound users.
    async fn delete_tenant(&self, id: Uuid) -> StoreResult<()>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn get_user(&self, id: Uuid) -> StoreResult<User>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    /// Inserts `user` only while no user exists; the check and the insert are one atomic step.
    /// `None` when some user already exists.
    async fn create_first_admin(&self, user: NewUser) -> StoreResult<Option<User>>;
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<User>;
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    async fn insert_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshToken>;
    async fn find_refresh_token(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>>;
    /// Returns whether a token was removed.
    async fn delete_refresh_token(&self, token_hash: &str) -> StoreResult<bool>;
    async fn delete_expired_refresh_tokens(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn list_forms(&self, tenant_id: Option<Uuid>) -> StoreResult<Vec<Form>>;
    async fn get_form(&self, id: Uuid) -> StoreResult<Form>;
    async fn find_form_by_slug(&self, tenant_id: Uuid, slug: &str) -> StoreResult<Option<Form>>;
    async fn create_form(&self, form: NewForm, fields: Vec<FieldInput>) -> StoreResult<Form>;
    /// When `fields` is given, every existing field is replaced atomically.
    async fn update_form(
        &self,
        id: Uuid,
        patch: FormPatch,
        fields: Option<Vec<FieldInput>>,
    ) -> StoreResult<Form>;
    async fn delete_form(&self, id: Uuid) -> StoreResult<()>;

    /// Ordered by `position`.
    async fn list_fields(&self, form_id: Uuid) -> StoreResult<Vec<Field>>;
    /// Appends after the current last position; a name already on the form is a conflict.
    async fn append_fields(&self, form_id: Uuid, fields: Vec<FieldInput>) -> StoreResult<Vec<Field>>;
    async fn update_field(&self, form_id: Uuid, field_id: Uuid, patch: FieldPatch)
        -> StoreResult<Field>;
    async fn delete_field(&self, form_id: Uuid, field_id: Uuid) -> StoreResult<()>;

    async fn list_field_templates(&self) -> StoreResult<Vec<FieldTemplate>>;
    async fn create_field_template(&self, input: FieldTemplateInput) -> StoreResult<FieldTemplate>;
    async fn update_field_template(
        &self,
        id: Uuid,
        patch: FieldTemplatePatch,
    ) -> StoreResult<FieldTemplate>;
    async fn delete_field_template(&self, id: Uuid) -> StoreResult<()>;

    async fn insert_submission(&self, submission: NewSubmission) -> StoreResult<Submission>;
    /// Newest first. `keyword` matches case-insensitively inside any string value of `data`.
    async fn list_submissions(
        &self,
        form_id: Uuid,
        page: PageRequest,
        keyword: Option<&str>,
    ) -> StoreResult<Page<Submission>>;
    async fn get_submission(&self, form_id: Uuid, id: Uuid) -> StoreResult<Submission>;
    async fn delete_submission(&self, form_id: Uuid, id: Uuid) -> StoreResult<()>;
    async fn count_submissions(&self, form_id: Uuid) -> StoreResult<i64>;
    /// Submissions per distinct non-null value of `data[field]`, most frequent first.
    async fn value_counts(&self, form_id: Uuid, field: &str) -> StoreResult<Vec<ValueCount>>;
    /// Submissions per UTC day since `since`, ascending; days without submissions are omitted.
    async fn daily_counts(
        &self,
        tenant_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<DailyCount>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
