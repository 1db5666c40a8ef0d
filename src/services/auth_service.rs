// services/auth_service.rs - login, refresh-token rotation, logout
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{self, Claims, TokenError};
use crate::config::SecurityConfig;
use crate::database::models::{NewUser, Role, User};
use crate::database::{FormStore, StoreError};
use crate::validation::rules::is_email;

/// Minimum length accepted at login, independent of the (possibly stricter) creation policy.
pub const LOGIN_MIN_PASSWORD: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    BadInput(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub struct AuthService<'a> {
    store: &'a dyn FormStore,
    security: &'a SecurityConfig,
}

impl<'a> AuthService<'a> {
    pub fn new(store: &'a dyn FormStore, security: &'a SecurityConfig) -> Self {
        Self { store, security }
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<TokenPair, AuthError> {
        let email = req.email.trim().to_lowercase();
        if !is_email(&email) {
            return Err(AuthError::BadInput("A valid email is required".to_string()));
        }
        if req.password.len() < LOGIN_MIN_PASSWORD {
            return Err(AuthError::BadInput(format!(
                "Password must be at least {} characters",
                LOGIN_MIN_PASSWORD
            )));
        }

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => self.bootstrap_admin(&email, &req.password).await?,
        };

        if !user.is_active || !auth::verify_password(&req.password, &user.password_hash) {
            warn!("Failed login for {}", email);
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        self.store.record_login(user.id, now).await?;
        let purged = self.store.delete_expired_refresh_tokens(user.id, now).await?;
        if purged > 0 {
            info!("Purged {} expired refresh token(s) for user {}", purged, user.id);
        }

        info!("User {} logged in", user.id);
        self.issue(&user).await
    }

    /// Creates the first admin from the login credentials when the user table is empty.
    async fn bootstrap_admin(&self, email: &str, password: &str) -> Result<User, AuthError> {
        if !self.security.bootstrap_first_admin {
            warn!("Failed login for unknown email {}", email);
            return Err(AuthError::InvalidCredentials);
        }
        let name = email.split('@').next().unwrap_or(email).to_string();
        let created = self
            .store
            .create_first_admin(NewUser {
                email: email.to_string(),
                name,
                password_hash: auth::hash_password(password)?,
                role: Role::Admin,
                tenant_id: None,
            })
            .await?;
        match created {
            Some(admin) => {
                info!("Bootstrapped first admin {}", admin.id);
                Ok(admin)
            }
            None => {
                warn!("Failed login for unknown email {}", email);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Exchange a refresh token for a new pair. The presented token is consumed.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let hash = auth::hash_token(refresh_token.trim());
        let stored = self
            .store
            .find_refresh_token(&hash)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        // Whoever deletes the row owns the rotation; a concurrent reuse loses here.
        if !self.store.delete_refresh_token(&hash).await? {
            return Err(AuthError::InvalidRefreshToken);
        }
        if stored.expires_at <= Utc::now() {
            return Err(AuthError::InvalidRefreshToken);
        }

        let user = match self.store.get_user(stored.user_id).await {
            Ok(user) if user.is_active => user,
            Ok(_) | Err(StoreError::NotFound(_)) => return Err(AuthError::InvalidRefreshToken),
            Err(e) => return Err(e.into()),
        };
        self.issue(&user).await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let removed = self
            .store
            .delete_refresh_token(&auth::hash_token(refresh_token.trim()))
            .await?;
        if !removed {
            info!("Logout with an unknown refresh token");
        }
        Ok(())
    }

    async fn issue(&self, user: &User) -> Result<TokenPair, AuthError> {
        let claims = Claims::new(user, self.security.access_token_ttl_secs);
        let access_token = auth::generate_jwt(&claims, &self.security.jwt_secret)?;

        let refresh_token = auth::new_refresh_token();
        let expires_at = Utc::now() + Duration::days(self.security.refresh_token_ttl_days);
        self.store
            .insert_refresh_token(user.id, auth::hash_token(&refresh_token), expires_at)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.security.access_token_ttl_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::MemoryStore;

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn first_login_bootstraps_admin_then_checks_password() {
        let store = MemoryStore::new();
        let config = AppConfig::development();
        let service = AuthService::new(&store, &config.security);

        let pair = service.login(&login("root@example.com", "secret1")).await.unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);

        let admin = store.find_user_by_email("root@example.com").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.last_login_at.is_some());

        let wrong = service.login(&login("root@example.com", "secret2")).await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
        let stranger = service.login(&login("other@example.com", "secret1")).await;
        assert!(matches!(stranger, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn bootstrap_can_be_disabled() {
        let store = MemoryStore::new();
        let mut config = AppConfig::development();
        config.security.bootstrap_first_admin = false;
        let service = AuthService::new(&store, &config.security);
        let result = service.login(&login("root@example.com", "secret1")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert!(store.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_first_logins_create_one_admin() {
        let store = MemoryStore::new();
        let config = AppConfig::development();
        let service = AuthService::new(&store, &config.security);

        let first = login("root@example.com", "secret1");
        let second = login("ops@example.com", "secret1");
        let (a, b) = tokio::join!(service.login(&first), service.login(&second));
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

        let users = store.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);
    }

    #[tokio::test]
    async fn login_input_is_checked_first() {
        let store = MemoryStore::new();
        let config = AppConfig::development();
        let service = AuthService::new(&store, &config.security);
        assert!(matches!(
            service.login(&login("nope", "secret1")).await,
            Err(AuthError::BadInput(_))
        ));
        assert!(matches!(
            service.login(&login("a@b.com", "123")).await,
            Err(AuthError::BadInput(_))
        ));
    }

    #[tokio::test]
    async fn refresh_rotates_and_old_token_dies() {
        let store = MemoryStore::new();
        let config = AppConfig::development();
        let service = AuthService::new(&store, &config.security);
        let first = service.login(&login("root@example.com", "secret1")).await.unwrap();

        let second = service.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        let reused = service.refresh(&first.refresh_token).await;
        assert!(matches!(reused, Err(AuthError::InvalidRefreshToken)));

        service.logout(&second.refresh_token).await.unwrap();
        assert!(service.refresh(&second.refresh_token).await.is_err());
        // logging out twice is fine
        service.logout(&second.refresh_token).await.unwrap();
    }
}
