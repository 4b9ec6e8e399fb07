//! Document store collaborator: tenant and user records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Role;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    pub primary_color: String,
    pub secondary_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            primary_color: "#1d4ed8".to_string(),
            secondary_color: "#f59e0b".to_string(),
            accent_color: None,
            logo_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub subdomain: String,
    #[serde(default)]
    pub branding: Branding,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub tenant_id: Option<String>,
    pub is_active: bool,
    pub must_change_password: bool,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Active tenant owning a subdomain label
    async fn tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<TenantRecord>, StoreError>;

    async fn tenant(&self, id: &str) -> Result<Option<TenantRecord>, StoreError>;

    /// Insert or replace. Subdomains are unique across tenants.
    async fn put_tenant(&self, tenant: TenantRecord) -> Result<(), StoreError>;

    async fn user(&self, uid: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn put_user(&self, user: UserRecord) -> Result<(), StoreError>;

    async fn users_for_tenant(&self, tenant_id: &str) -> Result<Vec<UserRecord>, StoreError>;
}
