use std::sync::Arc;

use crate::config::AppConfig;
use crate::identity::{IdentityProvider, MemoryIdentityProvider};
use crate::mail::{mailer_from_config, Mailer};
use crate::provisioning::UserProvisioner;
use crate::store::{DocumentStore, MemoryStore, PgDocumentStore, StoreError};
use crate::tenant::TenantResolver;

/// Collaborator handles shared by every request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub resolver: TenantResolver,
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn DocumentStore>,
    pub provisioner: UserProvisioner,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let provisioner = UserProvisioner::new(
            identity.clone(),
            store.clone(),
            mailer,
            config.tenant.clone(),
            config.mail.clone(),
        );

        Self {
            resolver: TenantResolver::new(config.tenant.clone()),
            config: Arc::new(config),
            identity,
            store,
            provisioner,
        }
    }

    /// Wire collaborators from configuration: Postgres documents when
    /// `DATABASE_URL` is set, otherwise in-memory.
    pub async fn from_config(config: AppConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn DocumentStore> = match &config.database.url {
            Some(url) => Arc::new(PgDocumentStore::connect(url, &config.database).await?),
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory document store");
                Arc::new(MemoryStore::new())
            }
        };

        let identity = Arc::new(MemoryIdentityProvider::new(config.security.clone()));
        let mailer = mailer_from_config(&config.mail);

        Ok(Self::new(config, identity, store, mailer))
    }
}
