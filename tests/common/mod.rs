#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use forms_api::app::{build_router, AppState};
use forms_api::config::AppConfig;
use forms_api::database::MemoryStore;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "password1";

/// The full router over a fresh in-memory store, driven in-process.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::development())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let router = build_router(AppState::new(store.clone(), config));
        Self { router, store }
    }

    pub async fn call(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("router failed")?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };
        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<TestResponse> {
        let auth = bearer(token);
        self.call(Method::GET, path, &[("authorization", auth.as_str())], None)
            .await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Result<TestResponse> {
        let auth = bearer(token);
        self.call(Method::POST, path, &[("authorization", auth.as_str())], Some(body))
            .await
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> Result<TestResponse> {
        let auth = bearer(token);
        self.call(Method::PATCH, path, &[("authorization", auth.as_str())], Some(body))
            .await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<TestResponse> {
        let auth = bearer(token);
        self.call(Method::DELETE, path, &[("authorization", auth.as_str())], None)
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TestResponse> {
        self.call(
            Method::POST,
            "/admin/auth/login",
            &[],
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// First login on an empty store creates the admin.
    pub async fn admin_token(&self) -> Result<String> {
        let res = self.login(ADMIN_EMAIL, PASSWORD).await?;
        anyhow::ensure!(res.status == StatusCode::OK, "admin login failed: {}", res.body);
        Ok(res.data()["access_token"].as_str().unwrap_or_default().to_string())
    }

    /// Returns (tenant id, plaintext API key).
    pub async fn create_tenant(&self, admin: &str, name: &str, origins: &[&str]) -> Result<(String, String)> {
        let res = self
            .post(
                "/admin/tenants",
                admin,
                json!({ "name": name, "allowed_origins": origins }),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "tenant create failed: {}", res.body);
        Ok((
            res.data()["id"].as_str().unwrap_or_default().to_string(),
            res.data()["api_key"].as_str().unwrap_or_default().to_string(),
        ))
    }

    /// Creates a `user` bound to the tenant and returns their access token.
    pub async fn user_token(&self, admin: &str, email: &str, tenant_id: &str) -> Result<String> {
        let res = self
            .post(
                "/admin/users",
                admin,
                json!({ "email": email, "password": PASSWORD, "role": "user", "tenant_id": tenant_id }),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "user create failed: {}", res.body);
        let login = self.login(email, PASSWORD).await?;
        Ok(login.data()["access_token"].as_str().unwrap_or_default().to_string())
    }

    /// Creates a form through the admin API and returns its JSON.
    pub async fn create_form(&self, token: &str, body: Value) -> Result<Value> {
        let res = self.post("/admin/forms", token, body).await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "form create failed: {}", res.body);
        Ok(res.data().clone())
    }

    pub async fn submit(&self, form: &str, headers: &[(&str, &str)], body: Value) -> Result<TestResponse> {
        self.call(Method::POST, &format!("/api/forms/{}/submit", form), headers, Some(body))
            .await
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
