mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{TestApp, PASSWORD};

#[tokio::test]
async fn tenant_lifecycle() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;

    let created = app
        .post(
            "/admin/tenants",
            &admin,
            json!({ "name": "acme", "domain": "acme.example", "allowed_origins": ["https://acme.example"] }),
        )
        .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.data()["id"].as_str().unwrap_or_default().to_string();
    let key = created.data()["api_key"].as_str().unwrap_or_default().to_string();
    assert!(!key.is_empty());
    assert!(created.data().get("api_key_hash").is_none());

    let fetched = app.get(&format!("/admin/tenants/{}", id), &admin).await?;
    assert_eq!(fetched.data()["name"], "acme");
    assert!(fetched.data().get("api_key").is_none());

    let listed = app.get("/admin/tenants", &admin).await?;
    assert_eq!(listed.data().as_array().map(Vec::len), Some(1));

    let renamed = app
        .patch(&format!("/admin/tenants/{}", id), &admin, json!({ "name": "acme-corp", "domain": "" }))
        .await?;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.data()["name"], "acme-corp");
    assert!(renamed.data()["domain"].is_null());

    let removed = app.delete(&format!("/admin/tenants/{}", id), &admin).await?;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    let gone = app.get(&format!("/admin/tenants/{}", id), &admin).await?;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn tenant_names_are_checked_and_unique() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;

    for bad in ["a", "bad name!", ""] {
        let res = app.post("/admin/tenants", &admin, json!({ "name": bad })).await?;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "name {:?}", bad);
    }

    app.create_tenant(&admin, "acme", &[]).await?;
    let dup = app.post("/admin/tenants", &admin, json!({ "name": "acme" })).await?;
    assert_eq!(dup.status, StatusCode::CONFLICT);
    assert_eq!(dup.error_code(), "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn rotating_the_key_revokes_the_old_one() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;
    let (id, old_key) = app.create_tenant(&admin, "acme", &[]).await?;

    let rotated = app
        .post(&format!("/admin/tenants/{}/api-key", id), &admin, json!({}))
        .await?;
    assert_eq!(rotated.status, StatusCode::OK);
    let new_key = rotated.data()["api_key"].as_str().unwrap_or_default().to_string();
    assert_ne!(new_key, old_key);

    let old = app
        .call(Method::GET, "/admin/forms", &[("x-api-key", old_key.as_str())], None)
        .await?;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    let new = app
        .call(Method::GET, "/admin/forms", &[("x-api-key", new_key.as_str())], None)
        .await?;
    assert_eq!(new.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn deleting_a_tenant_cascades() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;
    let (tenant_id, _) = app.create_tenant(&admin, "acme", &[]).await?;
    let user = app.user_token(&admin, "jo@acme.example", &tenant_id).await?;
    let form = app
        .create_form(
            &user,
            json!({ "name": "Contact", "fields": [{ "name": "email", "type": "email" }] }),
        )
        .await?;
    let form_id = form["id"].as_str().unwrap_or_default().to_string();
    let submitted = app.submit(&form_id, &[], json!({ "email": "a@b.com" })).await?;
    assert_eq!(submitted.status, StatusCode::CREATED);

    app.delete(&format!("/admin/tenants/{}", tenant_id), &admin).await?;

    let form = app.get(&format!("/admin/forms/{}", form_id), &admin).await?;
    assert_eq!(form.status, StatusCode::NOT_FOUND);
    let users = app.get("/admin/users", &admin).await?;
    assert_eq!(users.data().as_array().map(Vec::len), Some(1));
    let login = app.login("jo@acme.example", PASSWORD).await?;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn user_lifecycle() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;
    let (tenant_id, _) = app.create_tenant(&admin, "acme", &[]).await?;

    let created = app
        .post(
            "/admin/users",
            &admin,
            json!({ "email": "Jo@Acme.example", "name": "Jo", "password": PASSWORD, "role": "user", "tenant_id": tenant_id }),
        )
        .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.data()["email"], "jo@acme.example");
    assert!(created.data().get("password_hash").is_none());
    let id = created.data()["id"].as_str().unwrap_or_default().to_string();

    let renamed = app
        .patch(&format!("/admin/users/{}", id), &admin, json!({ "name": "Joanna", "password": "another1" }))
        .await?;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.data()["name"], "Joanna");
    assert_eq!(app.login("jo@acme.example", PASSWORD).await?.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.login("jo@acme.example", "another1").await?.status, StatusCode::OK);

    let removed = app.delete(&format!("/admin/users/{}", id), &admin).await?;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    let gone = app.get(&format!("/admin/users/{}", id), &admin).await?;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn user_input_is_validated() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;
    let (tenant_id, _) = app.create_tenant(&admin, "acme", &[]).await?;

    let cases = [
        json!({ "email": "not-an-email", "password": PASSWORD, "role": "user", "tenant_id": tenant_id }),
        json!({ "email": "a@acme.example", "password": "short", "role": "user", "tenant_id": tenant_id }),
        json!({ "email": "b@acme.example", "password": PASSWORD, "role": "user" }),
        json!({ "email": "c@acme.example", "password": PASSWORD, "role": "admin", "tenant_id": tenant_id }),
    ];
    for body in cases {
        let res = app.post("/admin/users", &admin, body.clone()).await?;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{}", body);
    }

    let dup = app
        .post(
            "/admin/users",
            &admin,
            json!({ "email": "ADMIN@example.com", "password": PASSWORD, "role": "admin" }),
        )
        .await?;
    assert_eq!(dup.status, StatusCode::CONFLICT);

    let missing_tenant = app
        .post(
            "/admin/users",
            &admin,
            json!({ "email": "d@acme.example", "password": PASSWORD, "role": "user", "tenant_id": uuid::Uuid::new_v4() }),
        )
        .await?;
    assert_eq!(missing_tenant.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn admins_cannot_delete_themselves() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;
    let current = app.get("/admin/auth/current", &admin).await?;
    let me = current.data()["user"]["id"].as_str().unwrap_or_default().to_string();

    let res = app.delete(&format!("/admin/users/{}", me), &admin).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn elevated_routes_are_admin_only() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;
    let (tenant_id, _) = app.create_tenant(&admin, "acme", &[]).await?;
    let user = app.user_token(&admin, "jo@acme.example", &tenant_id).await?;

    for path in ["/admin/tenants", "/admin/users"] {
        let res = app.get(path, &user).await?;
        assert_eq!(res.status, StatusCode::FORBIDDEN, "{}", path);
    }
    let template = app
        .post("/admin/field-templates", &user, json!({ "name": "email", "type": "email" }))
        .await?;
    assert_eq!(template.status, StatusCode::FORBIDDEN);

    // Listing templates is open to any signed-in user.
    let templates = app.get("/admin/field-templates", &user).await?;
    assert_eq!(templates.status, StatusCode::OK);
    Ok(())
}
