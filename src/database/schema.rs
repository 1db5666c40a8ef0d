// database/schema.rs - idempotent DDL applied at startup

/// Statements are executed one at a time; Postgres prepared statements take a single command.
pub const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS tenants (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        domain TEXT,
        allowed_origins TEXT[] NOT NULL DEFAULT '{}',
        api_key_hash TEXT NOT NULL UNIQUE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('admin', 'user')),
        tenant_id UUID REFERENCES tenants(id) ON DELETE CASCADE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        last_login_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS refresh_tokens (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        token_hash TEXT NOT NULL UNIQUE,
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS forms (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        slug TEXT,
        description TEXT,
        notify_emails TEXT[] NOT NULL DEFAULT '{}',
        allowed_origins TEXT[] NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (tenant_id, slug)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS fields (
        id UUID PRIMARY KEY,
        form_id UUID NOT NULL REFERENCES forms(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        field_type TEXT NOT NULL,
        required BOOLEAN NOT NULL DEFAULT FALSE,
        options TEXT[] NOT NULL DEFAULT '{}',
        validation_regex TEXT,
        position INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (form_id, name)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS field_templates (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        field_type TEXT NOT NULL,
        required BOOLEAN NOT NULL DEFAULT FALSE,
        options TEXT[] NOT NULL DEFAULT '{}',
        validation_regex TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS submissions (
        id UUID PRIMARY KEY,
        form_id UUID NOT NULL REFERENCES forms(id) ON DELETE CASCADE,
        tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        ip TEXT NOT NULL,
        user_agent TEXT NOT NULL,
        data JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    "CREATE INDEX IF NOT EXISTS fields_form_position_idx ON fields (form_id, position)",
    "CREATE INDEX IF NOT EXISTS submissions_form_created_idx ON submissions (form_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS submissions_tenant_created_idx ON submissions (tenant_id, created_at)",
    "CREATE INDEX IF NOT EXISTS refresh_tokens_user_idx ON refresh_tokens (user_id)",
];

#[cfg(test)]
mod tests {
    use super::SCHEMA;

    #[test]
    fn one_command_per_statement() {
        for stmt in SCHEMA {
            assert!(!stmt.trim_end().ends_with(';'));
            assert_eq!(stmt.matches("CREATE ").count(), 1, "{}", stmt);
        }
    }

    #[test]
    fn field_names_are_unique_per_form() {
        assert!(SCHEMA.iter().any(|s| s.contains("UNIQUE (form_id, name)")));
    }
}
