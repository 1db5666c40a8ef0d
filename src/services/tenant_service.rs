use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::auth::{hash_token, new_api_key};
use crate::database::models::{CreateTenantRequest, Tenant, TenantPatch, TenantWithKey};
use crate::database::{FormStore, NewTenant, StoreError};

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Invalid tenant name: {0}")]
    InvalidName(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct TenantService<'a> {
    store: &'a dyn FormStore,
}

impl<'a> TenantService<'a> {
    pub fn new(store: &'a dyn FormStore) -> Self {
        Self { store }
    }

    /// Create a tenant and its first API key. The plaintext key is returned only here.
    pub async fn create_tenant(&self, req: CreateTenantRequest) -> Result<TenantWithKey, TenantError> {
        let name = req.name.trim().to_string();
        validate_tenant_name(&name)?;

        let api_key = new_api_key();
        let tenant = self
            .store
            .create_tenant(NewTenant {
                name,
                domain: req.domain.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
                allowed_origins: clean_origins(req.allowed_origins),
                api_key_hash: hash_token(&api_key),
            })
            .await?;

        info!("Created tenant {} ({})", tenant.name, tenant.id);
        Ok(TenantWithKey { tenant, api_key })
    }

    pub async fn update_tenant(&self, id: Uuid, mut patch: TenantPatch) -> Result<Tenant, TenantError> {
        if let Some(name) = patch.name.take() {
            let name = name.trim().to_string();
            validate_tenant_name(&name)?;
            patch.name = Some(name);
        }
        patch.domain = patch.domain.map(|d| d.trim().to_string());
        patch.allowed_origins = patch.allowed_origins.map(clean_origins);

        let tenant = self.store.update_tenant(id, patch).await?;
        info!("Updated tenant {}", tenant.id);
        Ok(tenant)
    }

    /// Replace the tenant's API key; the previous key stops working immediately.
    pub async fn rotate_key(&self, id: Uuid) -> Result<TenantWithKey, TenantError> {
        let api_key = new_api_key();
        let tenant = self.store.set_tenant_api_key_hash(id, hash_token(&api_key)).await?;
        info!("Rotated API key of tenant {}", tenant.id);
        Ok(TenantWithKey { tenant, api_key })
    }

    pub async fn delete_tenant(&self, id: Uuid) -> Result<(), TenantError> {
        self.store.delete_tenant(id).await?;
        info!("Deleted tenant {} and everything it owned", id);
        Ok(())
    }
}

/// Validate tenant name follows rules
pub fn validate_tenant_name(name: &str) -> Result<(), TenantError> {
    if name.chars().count() < 2 {
        return Err(TenantError::InvalidName(
            "Tenant name must be at least 2 characters".to_string(),
        ));
    }

    if name.chars().count() > 100 {
        return Err(TenantError::InvalidName(
            "Tenant name must be at most 100 characters".to_string(),
        ));
    }

    // Only allow alphanumeric, hyphens, and underscores
    if !name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(TenantError::InvalidName(
            "Tenant name can only contain letters, numbers, hyphens, and underscores".to_string(),
        ));
    }

    Ok(())
}

fn clean_origins(origins: Vec<String>) -> Vec<String> {
    origins
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}
