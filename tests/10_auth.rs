mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{bearer, TestApp, ADMIN_EMAIL, PASSWORD};

#[tokio::test]
async fn first_login_bootstraps_admin() -> Result<()> {
    let app = TestApp::new();

    let res = app.login(ADMIN_EMAIL, PASSWORD).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["status"], "success");
    assert_eq!(res.data()["token_type"], "Bearer");
    assert_eq!(res.data()["expires_in"], 900);
    assert!(res.data()["refresh_token"].is_string());

    let token = res.data()["access_token"].as_str().unwrap_or_default();
    let current = app.get("/admin/auth/current", token).await?;
    assert_eq!(current.status, StatusCode::OK);
    assert_eq!(current.data()["user"]["email"], ADMIN_EMAIL);
    assert_eq!(current.data()["principal"]["role"], "admin");
    assert!(current.data()["user"].get("password_hash").is_none());

    // The second account is not bootstrapped.
    let other = app.login("someone@example.com", PASSWORD).await?;
    assert_eq!(other.status, StatusCode::UNAUTHORIZED);
    assert_eq!(other.body["error"]["message"], "Invalid credentials");
    Ok(())
}

#[tokio::test]
async fn login_rejects_bad_input_and_wrong_password() -> Result<()> {
    let app = TestApp::new();
    app.admin_token().await?;

    let res = app.login("not-an-email", PASSWORD).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "BAD_REQUEST");

    let res = app.login(ADMIN_EMAIL, "12345").await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.login(ADMIN_EMAIL, "wrong-password").await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_code(), "UNAUTHORIZED");

    let res = app
        .call(Method::POST, "/admin/auth/login", &[], Some(json!({ "email": ADMIN_EMAIL })))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_rejects_reuse() -> Result<()> {
    let app = TestApp::new();
    let login = app.login(ADMIN_EMAIL, PASSWORD).await?;
    let first = login.data()["refresh_token"].as_str().unwrap_or_default().to_string();

    let refreshed = app
        .call(
            Method::POST,
            "/admin/auth/refresh",
            &[],
            Some(json!({ "refresh_token": first })),
        )
        .await?;
    assert_eq!(refreshed.status, StatusCode::OK, "{}", refreshed.body);
    let second = refreshed.data()["refresh_token"].as_str().unwrap_or_default().to_string();
    assert_ne!(first, second);

    let reused = app
        .call(
            Method::POST,
            "/admin/auth/refresh",
            &[],
            Some(json!({ "refresh_token": first })),
        )
        .await?;
    assert_eq!(reused.status, StatusCode::UNAUTHORIZED);

    let logout = app
        .call(
            Method::POST,
            "/admin/auth/logout",
            &[],
            Some(json!({ "refresh_token": second })),
        )
        .await?;
    assert_eq!(logout.status, StatusCode::OK);

    let after_logout = app
        .call(
            Method::POST,
            "/admin/auth/refresh",
            &[],
            Some(json!({ "refresh_token": second })),
        )
        .await?;
    assert_eq!(after_logout.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_credentials() -> Result<()> {
    let app = TestApp::new();

    let res = app.call(Method::GET, "/admin/forms", &[], None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["status"], "error");

    let res = app.get("/admin/forms", "not-a-jwt").await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .call(Method::GET, "/admin/forms", &[("authorization", "Basic abc")], None)
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .call(Method::GET, "/admin/forms", &[("x-api-key", "fk_unknown")], None)
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn api_key_acts_as_tenant_user() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;
    let (tenant_id, api_key) = app.create_tenant(&admin, "acme", &[]).await?;

    let res = app
        .call(Method::GET, "/admin/auth/current", &[("x-api-key", api_key.as_str())], None)
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.data()["principal"]["method"], "api_key");
    assert_eq!(res.data()["principal"]["scope"], tenant_id.as_str());
    assert!(res.data()["user"].is_null());
    assert_eq!(res.data()["tenant"]["name"], "acme");

    // Not an admin: elevated routes are closed.
    let res = app
        .call(Method::GET, "/admin/tenants", &[("x-api-key", api_key.as_str())], None)
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    // Deactivating the tenant revokes its key.
    let res = app
        .patch(&format!("/admin/tenants/{}", tenant_id), &admin, json!({ "is_active": false }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let res = app
        .call(Method::GET, "/admin/forms", &[("x-api-key", api_key.as_str())], None)
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn users_are_scoped_and_cannot_escalate() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;
    let (acme, _) = app.create_tenant(&admin, "acme", &[]).await?;
    let (globex, _) = app.create_tenant(&admin, "globex", &[]).await?;
    let user = app.user_token(&admin, "jo@acme.example", &acme).await?;

    let res = app.get("/admin/users", &user).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    // The impersonation header is ignored for non-admins.
    let auth = bearer(&user);
    let res = app
        .call(
            Method::GET,
            "/admin/auth/current",
            &[
                ("authorization", auth.as_str()),
                ("x-impersonate-tenant", globex.as_str()),
            ],
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["principal"]["scope"], acme.as_str());
    assert_eq!(res.data()["principal"]["impersonating"], false);
    Ok(())
}

#[tokio::test]
async fn admin_impersonation_scopes_requests() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;
    let (acme, _) = app.create_tenant(&admin, "acme", &[]).await?;
    let (globex, _) = app.create_tenant(&admin, "globex", &[]).await?;
    app.create_form(&admin, json!({ "tenant_id": acme, "name": "Acme contact" })).await?;
    app.create_form(&admin, json!({ "tenant_id": globex, "name": "Globex contact" })).await?;

    let all = app.get("/admin/forms", &admin).await?;
    assert_eq!(all.data().as_array().map(Vec::len), Some(2));

    let auth = bearer(&admin);
    let scoped = app
        .call(
            Method::GET,
            "/admin/forms",
            &[("authorization", auth.as_str()), ("x-impersonate-tenant", acme.as_str())],
            None,
        )
        .await?;
    assert_eq!(scoped.status, StatusCode::OK);
    let forms = scoped.data().as_array().cloned().unwrap_or_default();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0]["name"], "Acme contact");

    let missing = app
        .call(
            Method::GET,
            "/admin/forms",
            &[
                ("authorization", auth.as_str()),
                ("x-impersonate-tenant", "00000000-0000-0000-0000-000000000000"),
            ],
            None,
        )
        .await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let garbage = app
        .call(
            Method::GET,
            "/admin/forms",
            &[("authorization", auth.as_str()), ("x-impersonate-tenant", "acme")],
            None,
        )
        .await?;
    assert_eq!(garbage.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn deactivated_user_loses_access_immediately() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_token().await?;
    let (acme, _) = app.create_tenant(&admin, "acme", &[]).await?;
    let user = app.user_token(&admin, "jo@acme.example", &acme).await?;

    let me = app.get("/admin/auth/current", &user).await?;
    let user_id = me.data()["user"]["id"].as_str().unwrap_or_default().to_string();

    let res = app
        .patch(&format!("/admin/users/{}", user_id), &admin, json!({ "is_active": false }))
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let res = app.get("/admin/forms", &user).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let res = app.login("jo@acme.example", common::PASSWORD).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}
