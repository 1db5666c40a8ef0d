//! HTTP client for the admin and submission APIs, used by the `forms` CLI.
//!
//! Access tokens are refreshed transparently. Concurrent requests that hit a 401 share one
//! refresh: the first caller through the gate rotates the pair, later callers notice the access
//! token already changed and just retry.
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::services::auth_service::TokenPair;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{code} ({status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        details: Option<Value>,
    },
    #[error("not logged in")]
    NotLoggedIn,
    #[error("unexpected response: {0}")]
    Decode(String),
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: RwLock<Option<TokenPair>>,
    refresh_gate: Mutex<()>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn with_tokens(self, tokens: Option<TokenPair>) -> Self {
        Self {
            tokens: RwLock::new(tokens),
            ..self
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current pair, for persisting after a session that may have rotated it.
    pub async fn tokens(&self) -> Option<TokenPair> {
        self.tokens.read().await.clone()
    }

    pub async fn set_tokens(&self, tokens: Option<TokenPair>) {
        *self.tokens.write().await = tokens;
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ClientError> {
        let response = self
            .http
            .post(self.url("/admin/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let pair: TokenPair = decode(response).await?;
        self.set_tokens(Some(pair.clone())).await;
        Ok(pair)
    }

    /// Revokes the refresh token server-side and forgets the pair.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let Some(pair) = self.tokens().await else {
            return Ok(());
        };
        let response = self
            .http
            .post(self.url("/admin/auth/logout"))
            .json(&json!({ "refresh_token": pair.refresh_token }))
            .send()
            .await?;
        let _: Value = decode(response).await?;
        self.set_tokens(None).await;
        Ok(())
    }

    /// Public submission; `form` is a form id, or a slug when `api_key` is given.
    pub async fn submit(
        &self,
        form: &str,
        data: &Value,
        api_key: Option<&str>,
    ) -> Result<Value, ClientError> {
        let mut request = self
            .http
            .post(self.url(&format!("/api/forms/{}/submit", form)))
            .json(data);
        if let Some(key) = api_key {
            request = request.header("x-api-key", key);
        }
        decode(request.send().await?).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ClientError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn patch<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ClientError> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let token = self.access_token().await?;
        let mut response = self.send(Method::DELETE, path, None, &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.refresh_after(&token).await?;
            let token = self.access_token().await?;
            response = self.send(Method::DELETE, path, None, &token).await?;
        }
        if response.status().is_success() {
            Ok(())
        } else {
            Err(api_error(response).await)
        }
    }

    /// Authenticated request; a 401 triggers one refresh and one retry.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        let token = self.access_token().await?;
        let response = self.send(method.clone(), path, body, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return decode(response).await;
        }

        self.refresh_after(&token).await?;
        let token = self.access_token().await?;
        decode(self.send(method, path, body, &token).await?).await
    }

    /// Refresh unless someone already replaced `stale` while we waited for the gate.
    async fn refresh_after(&self, stale: &str) -> Result<(), ClientError> {
        let _gate = self.refresh_gate.lock().await;

        let refresh_token = {
            let tokens = self.tokens.read().await;
            let pair = tokens.as_ref().ok_or(ClientError::NotLoggedIn)?;
            if pair.access_token != stale {
                debug!("Access token already rotated by a concurrent request");
                return Ok(());
            }
            pair.refresh_token.clone()
        };

        debug!("Refreshing access token");
        let response = self
            .http
            .post(self.url("/admin/auth/refresh"))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let pair: TokenPair = decode(response).await?;
        self.set_tokens(Some(pair)).await;
        Ok(())
    }

    async fn access_token(&self) -> Result<String, ClientError> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|p| p.access_token.clone())
            .ok_or(ClientError::NotLoggedIn)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let mut request = self.http.request(method, self.url(path)).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Unwrap the success envelope, or turn the error envelope into [`ClientError::Api`].
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    let mut body: Value = response.json().await?;
    let data = body
        .get_mut("data")
        .map(Value::take)
        .ok_or_else(|| ClientError::Decode("missing data".to_string()))?;
    serde_json::from_value(data).map_err(|e| ClientError::Decode(e.to_string()))
}

async fn api_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let error = &body["error"];
    ClientError::Api {
        status,
        code: error["code"].as_str().unwrap_or("UNKNOWN").to_string(),
        message: error["message"]
            .as_str()
            .unwrap_or("request failed")
            .to_string(),
        details: error.get("details").cloned(),
    }
}
