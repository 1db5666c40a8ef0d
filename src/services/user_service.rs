// services/user_service.rs - admin-managed user accounts
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::auth::{hash_password, TokenError};
use crate::database::models::{CreateUserRequest, NewUser, Role, UpdateUserRequest, User, UserPatch};
use crate::database::{FormStore, StoreError};
use crate::validation::rules::is_email;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Hashing(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct UserService<'a> {
    store: &'a dyn FormStore,
    min_password_length: usize,
}

impl<'a> UserService<'a> {
    pub fn new(store: &'a dyn FormStore, min_password_length: usize) -> Self {
        Self {
            store,
            min_password_length,
        }
    }

    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User, UserError> {
        let email = req.email.trim().to_lowercase();
        if !is_email(&email) {
            return Err(UserError::Invalid("A valid email is required".to_string()));
        }
        self.check_password(&req.password)?;
        let tenant_id = tenant_for_role(req.role, req.tenant_id)?;

        let name = req
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        let user = self
            .store
            .create_user(NewUser {
                email,
                name,
                password_hash: hash_password(&req.password)?,
                role: req.role,
                tenant_id,
            })
            .await?;
        info!("Created {} user {}", user.role.as_str(), user.id);
        Ok(user)
    }

    /// Role and tenant are checked together against the user's current record.
    pub async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> Result<User, UserError> {
        let current = self.store.get_user(id).await?;

        let role = req.role.unwrap_or(current.role);
        let tenant_changes = req.role.is_some() || req.tenant_id.is_some();
        let tenant_id = if tenant_changes {
            let wanted = match role {
                Role::Admin => req.tenant_id,
                Role::User => req.tenant_id.or(current.tenant_id),
            };
            Some(tenant_for_role(role, wanted)?)
        } else {
            None
        };

        let password_hash = match req.password.as_deref() {
            Some(password) => {
                self.check_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let name = match req.name {
            Some(name) if name.trim().is_empty() => {
                return Err(UserError::Invalid("Name cannot be empty".to_string()))
            }
            other => other.map(|n| n.trim().to_string()),
        };

        let user = self
            .store
            .update_user(
                id,
                UserPatch {
                    name,
                    password_hash,
                    role: req.role,
                    tenant_id,
                    is_active: req.is_active,
                },
            )
            .await?;
        info!("Updated user {}", user.id);
        Ok(user)
    }

    fn check_password(&self, password: &str) -> Result<(), UserError> {
        if password.chars().count() < self.min_password_length {
            return Err(UserError::Invalid(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }
        Ok(())
    }
}

/// A `user` belongs to exactly one tenant; an `admin` to none.
fn tenant_for_role(role: Role, tenant_id: Option<Uuid>) -> Result<Option<Uuid>, UserError> {
    match (role, tenant_id) {
        (Role::Admin, None) => Ok(None),
        (Role::Admin, Some(_)) => Err(UserError::Invalid(
            "Admins are not bound to a tenant".to_string(),
        )),
        (Role::User, Some(id)) => Ok(Some(id)),
        (Role::User, None) => Err(UserError::Invalid(
            "Users must belong to a tenant".to_string(),
        )),
    }
}
