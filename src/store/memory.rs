use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{DocumentStore, StoreError, TenantRecord, UserRecord};

#[derive(Default)]
struct Collections {
    tenants: HashMap<String, TenantRecord>,
    users: HashMap<String, UserRecord>,
}

/// Document store held in process memory. Used when no database is configured.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<TenantRecord>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .tenants
            .values()
            .find(|t| t.is_active && t.subdomain.eq_ignore_ascii_case(subdomain))
            .cloned())
    }

    async fn tenant(&self, id: &str) -> Result<Option<TenantRecord>, StoreError> {
        Ok(self.collections.read().await.tenants.get(id).cloned())
    }

    async fn put_tenant(&self, tenant: TenantRecord) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;

        let taken = collections
            .tenants
            .values()
            .any(|t| t.id != tenant.id && t.subdomain.eq_ignore_ascii_case(&tenant.subdomain));
        if taken {
            return Err(StoreError::Conflict(format!("subdomain '{}' already in use", tenant.subdomain)));
        }

        collections.tenants.insert(tenant.id.clone(), tenant);
        Ok(())
    }

    async fn user(&self, uid: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.collections.read().await.users.get(uid).cloned())
    }

    async fn put_user(&self, user: UserRecord) -> Result<(), StoreError> {
        self.collections.write().await.users.insert(user.uid.clone(), user);
        Ok(())
    }

    async fn users_for_tenant(&self, tenant_id: &str) -> Result<Vec<UserRecord>, StoreError> {
        let collections = self.collections.read().await;
        let mut users: Vec<UserRecord> = collections
            .users
            .values()
            .filter(|u| u.tenant_id.as_deref() == Some(tenant_id))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.email.cmp(&b.email)));
        Ok(users)
    }
}
