use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;

use super::{DocumentStore, StoreError, TenantRecord, UserRecord};
use crate::config::DatabaseConfig;

/// Postgres-backed document store. Each record is a JSONB document keyed
/// by its id, with the lookup columns kept alongside.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected document store (max {} connections)", config.max_connections);

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the document tables when missing
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                subdomain TEXT NOT NULL UNIQUE,
                doc JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS users (
                uid TEXT PRIMARY KEY,
                tenant_id TEXT,
                doc JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            "CREATE INDEX IF NOT EXISTS users_tenant_id_idx ON users (tenant_id)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn tenant_from_row(row: &sqlx::postgres::PgRow) -> Result<TenantRecord, StoreError> {
    let Json(tenant): Json<TenantRecord> = row.try_get("doc")?;
    Ok(tenant)
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<UserRecord, StoreError> {
    let Json(user): Json<UserRecord> = row.try_get("doc")?;
    Ok(user)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<TenantRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT doc FROM tenants
            WHERE subdomain = lower($1)
            AND COALESCE((doc->>'isActive')::boolean, true)
            "#,
        )
        .bind(subdomain)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn tenant(&self, id: &str) -> Result<Option<TenantRecord>, StoreError> {
        let row = sqlx::query("SELECT doc FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn put_tenant(&self, tenant: TenantRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO tenants (id, subdomain, doc)
            VALUES ($1, lower($2), $3)
            ON CONFLICT (id) DO UPDATE
            SET subdomain = EXCLUDED.subdomain, doc = EXCLUDED.doc, updated_at = now()
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.subdomain)
        .bind(Json(&tenant))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                "subdomain '{}' already in use",
                tenant.subdomain
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn user(&self, uid: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query("SELECT doc FROM users WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn put_user(&self, user: UserRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (uid, tenant_id, doc)
            VALUES ($1, $2, $3)
            ON CONFLICT (uid) DO UPDATE
            SET tenant_id = EXCLUDED.tenant_id, doc = EXCLUDED.doc, updated_at = now()
            "#,
        )
        .bind(&user.uid)
        .bind(&user.tenant_id)
        .bind(Json(&user))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn users_for_tenant(&self, tenant_id: &str) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT doc FROM users
            WHERE tenant_id = $1
            ORDER BY (doc->>'createdAt')::timestamptz, doc->>'email'
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }
}
