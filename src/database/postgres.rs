//! Postgres-backed implementation of [`FormStore`].
//!
//! Tables are created by [`DatabaseManager::ensure_schema`]. Cascades (tenant → forms → fields,
//! submissions; tenant → users → refresh tokens) are declared as `ON DELETE CASCADE` foreign keys,
//! so a single `DELETE` removes a whole subtree atomically. Field replacement and multi-field
//! appends run in explicit transactions.
//!
//! Unique violations (`23505`) surface as [`StoreError::Conflict`], missing references (`23503`) as
//! [`StoreError::NotFound`]; every other driver error is [`StoreError::Unexpected`].
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::manager::DatabaseManager;
use super::models::{
    DailyCount, Field, FieldInput, FieldPatch, FieldTemplate, FieldTemplateInput,
    FieldTemplatePatch, Form, FormPatch, NewForm, NewSubmission, NewUser, Page, PageRequest,
    RefreshToken, Submission, Tenant, TenantPatch, User, UserPatch, ValueCount,
};
use super::store::{FormStore, NewTenant, StoreError, StoreResult};

const TENANT_COLUMNS: &str =
    "id, name, domain, allowed_origins, api_key_hash, is_active, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, name, password_hash, role, tenant_id, is_active, \
     last_login_at, created_at, updated_at";
const FORM_COLUMNS: &str = "id, tenant_id, name, slug, description, notify_emails, \
     allowed_origins, created_at, updated_at";
const FIELD_COLUMNS: &str =
    "id, form_id, name, field_type, required, options, validation_regex, position, created_at";
const TEMPLATE_COLUMNS: &str =
    "id, name, field_type, required, options, validation_regex, created_at";
const SUBMISSION_COLUMNS: &str = "id, form_id, tenant_id, ip, user_agent, data, created_at";

pub struct PgStore {
    db: DatabaseManager,
}

impl PgStore {
    pub fn new(db: DatabaseManager) -> Self {
        Self { db }
    }

    fn pool(&self) -> &PgPool {
        self.db.pool()
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    let what = db_err.constraint().unwrap_or("unique constraint");
                    return StoreError::Conflict(format!("duplicate value violates {}", what));
                }
                Some("23503") => {
                    return StoreError::NotFound("referenced record does not exist".into());
                }
                _ => {}
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return StoreError::NotFound("record".into());
        }
        StoreError::Unexpected(err.into())
    }
}

fn not_found(what: &str, id: Uuid) -> StoreError {
    StoreError::NotFound(format!("{} {}", what, id))
}

/// `$2` is an optional LIKE pattern matched against every string value in `data`, at any depth.
const KEYWORD_FILTER: &str = "($2::text IS NULL OR EXISTS (\
     SELECT 1 FROM jsonb_path_query(data, 'strict $.**') AS v(item) \
     WHERE jsonb_typeof(v.item) = 'string' AND v.item #>> '{}' ILIKE $2))";

/// Escape LIKE metacharacters so keywords match literally.
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

async fn insert_field(
    conn: &mut PgConnection,
    form_id: Uuid,
    input: &FieldInput,
    position: i32,
) -> StoreResult<Field> {
    let sql = format!(
        "INSERT INTO fields (id, form_id, name, field_type, required, options, validation_regex, position) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
        FIELD_COLUMNS
    );
    let field = sqlx::query_as::<_, Field>(&sql)
        .bind(Uuid::new_v4())
        .bind(form_id)
        .bind(&input.name)
        .bind(input.field_type.as_str())
        .bind(input.required)
        .bind(&input.options)
        .bind(&input.validation_regex)
        .bind(position)
        .fetch_one(&mut *conn)
        .await?;
    Ok(field)
}

async fn next_position(conn: &mut PgConnection, form_id: Uuid) -> StoreResult<i32> {
    let next = sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM fields WHERE form_id = $1",
    )
    .bind(form_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(next)
}

#[async_trait]
impl FormStore for PgStore {
    async fn list_tenants(&self) -> StoreResult<Vec<Tenant>> {
        let sql = format!("SELECT {} FROM tenants ORDER BY created_at", TENANT_COLUMNS);
        Ok(sqlx::query_as::<_, Tenant>(&sql).fetch_all(self.pool()).await?)
    }

    async fn get_tenant(&self, id: Uuid) -> StoreResult<Tenant> {
        let sql = format!("SELECT {} FROM tenants WHERE id = $1", TENANT_COLUMNS);
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| not_found("tenant", id))
    }

    async fn find_tenant_by_api_key_hash(&self, hash: &str) -> StoreResult<Option<Tenant>> {
        let sql = format!("SELECT {} FROM tenants WHERE api_key_hash = $1", TENANT_COLUMNS);
        Ok(sqlx::query_as::<_, Tenant>(&sql)
            .bind(hash)
            .fetch_optional(self.pool())
            .await?)
    }

    async fn create_tenant(&self, tenant: NewTenant) -> StoreResult<Tenant> {
        let sql = format!(
            "INSERT INTO tenants (id, name, domain, allowed_origins, api_key_hash) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            TENANT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Tenant>(&sql)
            .bind(Uuid::new_v4())
            .bind(&tenant.name)
            .bind(&tenant.domain)
            .bind(&tenant.allowed_origins)
            .bind(&tenant.api_key_hash)
            .fetch_one(self.pool())
            .await?)
    }

    async fn update_tenant(&self, id: Uuid, patch: TenantPatch) -> StoreResult<Tenant> {
        let sql = format!(
            "UPDATE tenants SET \
                name = COALESCE($2, name), \
                domain = CASE WHEN $3::text IS NULL THEN domain ELSE NULLIF($3, '') END, \
                allowed_origins = COALESCE($4, allowed_origins), \
                is_active = COALESCE($5, is_active), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            TENANT_COLUMNS
        );
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(&patch.domain)
            .bind(&patch.allowed_origins)
            .bind(patch.is_active)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| not_found("tenant", id))
    }

    async fn set_tenant_api_key_hash(&self, id: Uuid, hash: String) -> StoreResult<Tenant> {
        let sql = format!(
            "UPDATE tenants SET api_key_hash = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            TENANT_COLUMNS
        );
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(id)
            .bind(&hash)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| not_found("tenant", id))
    }

    async fn delete_tenant(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("tenant", id));
        }
        Ok(())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(self.pool()).await?)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| not_found("user", id))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool())
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, email, name, password_hash, role, tenant_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.tenant_id)
            .fetch_one(self.pool())
            .await?)
    }

    async fn create_first_admin(&self, user: NewUser) -> StoreResult<Option<User>> {
        let mut tx = self.pool().begin().await?;
        // Self-conflicting lock: a second bootstrap waits here until the first commits.
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users)")
            .fetch_one(&mut *tx)
            .await?;
        if exists {
            return Ok(None);
        }
        let sql = format!(
            "INSERT INTO users (id, email, name, password_hash, role, tenant_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.tenant_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(created))
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<User> {
        let sql = format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                password_hash = COALESCE($3, password_hash), \
                role = COALESCE($4, role), \
                tenant_id = CASE WHEN $5 THEN $6 ELSE tenant_id END, \
                is_active = COALESCE($7, is_active), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(&patch.password_hash)
            .bind(patch.role.map(|r| r.as_str()))
            .bind(patch.tenant_id.is_some())
            .bind(patch.tenant_id.flatten())
            .bind(patch.is_active)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| not_found("user", id))
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("user", id));
        }
        Ok(())
    }

    async fn insert_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshToken> {
        Ok(sqlx::query_as::<_, RefreshToken>(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4) RETURNING id, user_id, token_hash, expires_at, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .fetch_one(self.pool())
        .await?)
    }

    async fn find_refresh_token(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token_hash, expires_at, created_at \
             FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(self.pool())
        .await?)
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_refresh_tokens(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND expires_at <= $2")
                .bind(user_id)
                .bind(now)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected())
    }

    async fn list_forms(&self, tenant_id: Option<Uuid>) -> StoreResult<Vec<Form>> {
        let sql = format!(
            "SELECT {} FROM forms WHERE ($1::uuid IS NULL OR tenant_id = $1) \
             ORDER BY created_at DESC",
            FORM_COLUMNS
        );
        Ok(sqlx::query_as::<_, Form>(&sql)
            .bind(tenant_id)
            .fetch_all(self.pool())
            .await?)
    }

    async fn get_form(&self, id: Uuid) -> StoreResult<Form> {
        let sql = format!("SELECT {} FROM forms WHERE id = $1", FORM_COLUMNS);
        sqlx::query_as::<_, Form>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| not_found("form", id))
    }

    async fn find_form_by_slug(&self, tenant_id: Uuid, slug: &str) -> StoreResult<Option<Form>> {
        let sql = format!(
            "SELECT {} FROM forms WHERE tenant_id = $1 AND slug = $2",
            FORM_COLUMNS
        );
        Ok(sqlx::query_as::<_, Form>(&sql)
            .bind(tenant_id)
            .bind(slug)
            .fetch_optional(self.pool())
            .await?)
    }

    async fn create_form(&self, form: NewForm, fields: Vec<FieldInput>) -> StoreResult<Form> {
        let mut tx = self.pool().begin().await?;
        let sql = format!(
            "INSERT INTO forms (id, tenant_id, name, slug, description, notify_emails, allowed_origins) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            FORM_COLUMNS
        );
        let created = sqlx::query_as::<_, Form>(&sql)
            .bind(Uuid::new_v4())
            .bind(form.tenant_id)
            .bind(&form.name)
            .bind(&form.slug)
            .bind(&form.description)
            .bind(&form.notify_emails)
            .bind(&form.allowed_origins)
            .fetch_one(&mut *tx)
            .await?;
        for (position, input) in fields.iter().enumerate() {
            insert_field(&mut tx, created.id, input, position as i32).await?;
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn update_form(
        &self,
        id: Uuid,
        patch: FormPatch,
        fields: Option<Vec<FieldInput>>,
    ) -> StoreResult<Form> {
        let mut tx = self.pool().begin().await?;
        let sql = format!(
            "UPDATE forms SET \
                name = COALESCE($2, name), \
                slug = CASE WHEN $3 THEN $4 ELSE slug END, \
                description = CASE WHEN $5 THEN $6 ELSE description END, \
                notify_emails = COALESCE($7, notify_emails), \
                allowed_origins = COALESCE($8, allowed_origins), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            FORM_COLUMNS
        );
        let updated = sqlx::query_as::<_, Form>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(patch.slug.is_some())
            .bind(patch.slug.clone().flatten())
            .bind(patch.description.is_some())
            .bind(patch.description.clone().flatten())
            .bind(&patch.notify_emails)
            .bind(&patch.allowed_origins)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("form", id))?;

        if let Some(inputs) = fields {
            sqlx::query("DELETE FROM fields WHERE form_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for (position, input) in inputs.iter().enumerate() {
                insert_field(&mut tx, id, input, position as i32).await?;
            }
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_form(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM forms WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("form", id));
        }
        Ok(())
    }

    async fn list_fields(&self, form_id: Uuid) -> StoreResult<Vec<Field>> {
        let sql = format!(
            "SELECT {} FROM fields WHERE form_id = $1 ORDER BY position, created_at",
            FIELD_COLUMNS
        );
        Ok(sqlx::query_as::<_, Field>(&sql)
            .bind(form_id)
            .fetch_all(self.pool())
            .await?)
    }

    async fn append_fields(&self, form_id: Uuid, fields: Vec<FieldInput>) -> StoreResult<Vec<Field>> {
        let mut tx = self.pool().begin().await?;
        // Row lock on the form serializes concurrent appends computing the same next position.
        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM forms WHERE id = $1 FOR UPDATE")
            .bind(form_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(not_found("form", form_id));
        }
        let mut position = next_position(&mut tx, form_id).await?;
        let mut created = Vec::with_capacity(fields.len());
        for input in &fields {
            created.push(insert_field(&mut tx, form_id, input, position).await?);
            position += 1;
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn update_field(
        &self,
        form_id: Uuid,
        field_id: Uuid,
        patch: FieldPatch,
    ) -> StoreResult<Field> {
        let regex = patch.regex_update();
        let sql = format!(
            "UPDATE fields SET \
                name = COALESCE($3, name), \
                field_type = COALESCE($4, field_type), \
                required = COALESCE($5, required), \
                options = COALESCE($6, options), \
                validation_regex = CASE WHEN $7 THEN $8 ELSE validation_regex END, \
                position = COALESCE($9, position) \
             WHERE id = $1 AND form_id = $2 RETURNING {}",
            FIELD_COLUMNS
        );
        sqlx::query_as::<_, Field>(&sql)
            .bind(field_id)
            .bind(form_id)
            .bind(&patch.name)
            .bind(patch.field_type.as_ref().map(|t| t.as_str()))
            .bind(patch.required)
            .bind(&patch.options)
            .bind(regex.is_some())
            .bind(regex.flatten())
            .bind(patch.position)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| not_found("field", field_id))
    }

    async fn delete_field(&self, form_id: Uuid, field_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM fields WHERE id = $1 AND form_id = $2")
            .bind(field_id)
            .bind(form_id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("field", field_id));
        }
        Ok(())
    }

    async fn list_field_templates(&self) -> StoreResult<Vec<FieldTemplate>> {
        let sql = format!("SELECT {} FROM field_templates ORDER BY name", TEMPLATE_COLUMNS);
        Ok(sqlx::query_as::<_, FieldTemplate>(&sql)
            .fetch_all(self.pool())
            .await?)
    }

    async fn create_field_template(&self, input: FieldTemplateInput) -> StoreResult<FieldTemplate> {
        let sql = format!(
            "INSERT INTO field_templates (id, name, field_type, required, options, validation_regex) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            TEMPLATE_COLUMNS
        );
        Ok(sqlx::query_as::<_, FieldTemplate>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.name)
            .bind(input.field_type.as_str())
            .bind(input.required)
            .bind(&input.options)
            .bind(&input.validation_regex)
            .fetch_one(self.pool())
            .await?)
    }

    async fn update_field_template(
        &self,
        id: Uuid,
        patch: FieldTemplatePatch,
    ) -> StoreResult<FieldTemplate> {
        let regex = patch.regex_update();
        let sql = format!(
            "UPDATE field_templates SET \
                name = COALESCE($2, name), \
                field_type = COALESCE($3, field_type), \
                required = COALESCE($4, required), \
                options = COALESCE($5, options), \
                validation_regex = CASE WHEN $6 THEN $7 ELSE validation_regex END \
             WHERE id = $1 RETURNING {}",
            TEMPLATE_COLUMNS
        );
        sqlx::query_as::<_, FieldTemplate>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(patch.field_type.as_ref().map(|t| t.as_str()))
            .bind(patch.required)
            .bind(&patch.options)
            .bind(regex.is_some())
            .bind(regex.flatten())
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| not_found("field template", id))
    }

    async fn delete_field_template(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM field_templates WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("field template", id));
        }
        Ok(())
    }

    async fn insert_submission(&self, submission: NewSubmission) -> StoreResult<Submission> {
        let sql = format!(
            "INSERT INTO submissions (id, form_id, tenant_id, ip, user_agent, data) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            SUBMISSION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Submission>(&sql)
            .bind(Uuid::new_v4())
            .bind(submission.form_id)
            .bind(submission.tenant_id)
            .bind(&submission.ip)
            .bind(&submission.user_agent)
            .bind(&submission.data)
            .fetch_one(self.pool())
            .await?)
    }

    async fn list_submissions(
        &self,
        form_id: Uuid,
        page: PageRequest,
        keyword: Option<&str>,
    ) -> StoreResult<Page<Submission>> {
        let pattern = keyword.map(like_pattern);
        let count_sql = format!(
            "SELECT COUNT(*) FROM submissions WHERE form_id = $1 AND {}",
            KEYWORD_FILTER
        );
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(form_id)
            .bind(&pattern)
            .fetch_one(self.pool())
            .await?;

        let sql = format!(
            "SELECT {} FROM submissions \
             WHERE form_id = $1 AND {} \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            SUBMISSION_COLUMNS, KEYWORD_FILTER
        );
        let items = sqlx::query_as::<_, Submission>(&sql)
            .bind(form_id)
            .bind(&pattern)
            .bind(page.page_size as i64)
            .bind(page.offset() as i64)
            .fetch_all(self.pool())
            .await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    async fn get_submission(&self, form_id: Uuid, id: Uuid) -> StoreResult<Submission> {
        let sql = format!(
            "SELECT {} FROM submissions WHERE id = $1 AND form_id = $2",
            SUBMISSION_COLUMNS
        );
        sqlx::query_as::<_, Submission>(&sql)
            .bind(id)
            .bind(form_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| not_found("submission", id))
    }

    async fn delete_submission(&self, form_id: Uuid, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM submissions WHERE id = $1 AND form_id = $2")
            .bind(id)
            .bind(form_id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("submission", id));
        }
        Ok(())
    }

    async fn count_submissions(&self, form_id: Uuid) -> StoreResult<i64> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM submissions WHERE form_id = $1")
                .bind(form_id)
                .fetch_one(self.pool())
                .await?,
        )
    }

    async fn value_counts(&self, form_id: Uuid, field: &str) -> StoreResult<Vec<ValueCount>> {
        Ok(sqlx::query_as::<_, ValueCount>(
            "SELECT value, COUNT(*) AS count \
             FROM (SELECT data -> $2::text AS value FROM submissions WHERE form_id = $1) AS picked \
             WHERE jsonb_typeof(value) <> 'null' \
             GROUP BY value \
             ORDER BY count DESC, value::text",
        )
        .bind(form_id)
        .bind(field)
        .fetch_all(self.pool())
        .await?)
    }

    async fn daily_counts(
        &self,
        tenant_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<DailyCount>> {
        Ok(sqlx::query_as::<_, DailyCount>(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS count \
             FROM submissions \
             WHERE created_at >= $1 AND ($2::uuid IS NULL OR tenant_id = $2) \
             GROUP BY day ORDER BY day",
        )
        .bind(since)
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await?)
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.db
            .health_check()
            .await
            .map_err(|err| StoreError::Unexpected(anyhow!(err)))
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::NotFound(_)));
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unexpected(_)));
    }
}
