use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use forms_api::app::{build_router, AppState};
use forms_api::client::{ApiClient, ClientError};
use forms_api::config::AppConfig;
use forms_api::database::MemoryStore;
use forms_api::services::TokenPair;

const ADMIN_EMAIL: &str = "admin@example.com";
const PASSWORD: &str = "password1";

/// Serves the full app over a real socket and returns its base URL.
async fn spawn_server() -> Result<String> {
    let port = portpicker::pick_unused_port().ok_or_else(|| anyhow::anyhow!("no free port"))?;
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let router = build_router(AppState::new(
        Arc::new(MemoryStore::new()),
        AppConfig::development(),
    ));
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://127.0.0.1:{}", port))
}

#[tokio::test]
async fn login_then_call_admin_api() -> Result<()> {
    let base = spawn_server().await?;
    let client = ApiClient::new(format!("{}/", base));
    assert_eq!(client.base_url(), base);

    let pair = client.login(ADMIN_EMAIL, PASSWORD).await?;
    assert_eq!(pair.token_type, "Bearer");

    let tenant: Value = client
        .post("/admin/tenants", &json!({ "name": "acme" }))
        .await?;
    let form: Value = client
        .post(
            "/admin/forms",
            &json!({
                "tenant_id": tenant["id"],
                "name": "Contact",
                "fields": [{ "name": "email", "type": "email", "required": true }]
            }),
        )
        .await?;
    let form_id = form["id"].as_str().unwrap_or_default().to_string();

    let forms: Vec<Value> = client.get("/admin/forms").await?;
    assert_eq!(forms.len(), 1);

    let accepted = client
        .submit(&form_id, &json!({ "email": "a@b.com" }), None)
        .await?;
    assert!(accepted["id"].is_string());

    let rejected = client.submit(&form_id, &json!({}), None).await;
    match rejected {
        Err(ClientError::Api { status, code, details, .. }) => {
            assert_eq!(status, 400);
            assert_eq!(code, "VALIDATION_ERROR");
            assert!(details.is_some());
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    let by_key = client
        .submit(
            "contact",
            &json!({ "email": "a@b.com" }),
            tenant["api_key"].as_str(),
        )
        .await;
    assert!(matches!(by_key, Err(ClientError::Api { status: 404, .. })));

    client.delete(&format!("/admin/forms/{}", form_id)).await?;
    let forms: Vec<Value> = client.get("/admin/forms").await?;
    assert!(forms.is_empty());
    Ok(())
}

#[tokio::test]
async fn concurrent_expired_requests_share_one_refresh() -> Result<()> {
    let base = spawn_server().await?;
    let client = Arc::new(ApiClient::new(&base));
    let pair = client.login(ADMIN_EMAIL, PASSWORD).await?;

    // Simulate an expired access token; only the refresh token is still good.
    client
        .set_tokens(Some(TokenPair {
            access_token: "expired".to_string(),
            ..pair.clone()
        }))
        .await;

    let calls: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get::<Vec<Value>>("/admin/forms").await })
        })
        .collect();
    for call in calls {
        call.await??;
    }

    // Refresh tokens are single-use, so a second refresh would have failed one of the calls.
    let rotated = client.tokens().await.ok_or_else(|| anyhow::anyhow!("tokens dropped"))?;
    assert_ne!(rotated.refresh_token, pair.refresh_token);
    assert_ne!(rotated.access_token, "expired");
    Ok(())
}

#[tokio::test]
async fn logout_forgets_tokens() -> Result<()> {
    let base = spawn_server().await?;
    let client = ApiClient::new(&base);
    let pair = client.login(ADMIN_EMAIL, PASSWORD).await?;

    client.logout().await?;
    assert!(client.tokens().await.is_none());
    assert!(matches!(
        client.get::<Value>("/admin/forms").await,
        Err(ClientError::NotLoggedIn)
    ));

    // The revoked refresh token no longer works.
    let stale = ApiClient::new(&base).with_tokens(Some(TokenPair {
        access_token: "expired".to_string(),
        ..pair
    }));
    assert!(matches!(
        stale.get::<Value>("/admin/forms").await,
        Err(ClientError::Api { status: 401, .. })
    ));
    Ok(())
}
