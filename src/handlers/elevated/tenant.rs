// handlers/elevated/tenant.rs - POST /api/tenants handler

use axum::{
    extract::{Extension, State},
    Json,
};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthSession};
use crate::state::AppState;
use crate::store::{Branding, TenantRecord};
use crate::tenant::is_valid_label;
use crate::theme;

/// Subdomains that collide with platform hosts
const RESERVED_SUBDOMAINS: &[&str] = &["www", "api", "admin", "app"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    pub name: String,
    pub subdomain: String,
    #[serde(default)]
    pub branding: Option<Branding>,
}

/// POST /api/tenants - Register a new school
///
/// Superadmin only. The subdomain must be a single hostname label and
/// unique across tenants; branding colors are validated by rendering the
/// theme before anything is stored.
pub async fn create_tenant(
    State(state): State<AppState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Json(request): Json<CreateTenantRequest>,
) -> ApiResult<TenantRecord> {
    if !session.is_superadmin() {
        return Err(ApiError::forbidden("Superadmin access required"));
    }

    let name = request.name.trim().to_string();
    let subdomain = request.subdomain.trim().to_ascii_lowercase();

    let mut field_errors = HashMap::new();
    if name.is_empty() {
        field_errors.insert("name".to_string(), "Name is required".to_string());
    }
    if !is_valid_label(&subdomain) {
        field_errors.insert("subdomain".to_string(), "Must be a single hostname label".to_string());
    } else if RESERVED_SUBDOMAINS.contains(&subdomain.as_str()) || subdomain == state.config.tenant.root_label() {
        field_errors.insert("subdomain".to_string(), format!("'{}' is reserved", subdomain));
    }
    if !field_errors.is_empty() {
        return Err(ApiError::validation_error("Invalid tenant", Some(field_errors)));
    }

    let branding = request.branding.unwrap_or_default();
    theme::theme_css(&branding)?;

    let tenant = TenantRecord {
        id: Uuid::new_v4().to_string(),
        name,
        subdomain,
        branding,
        is_active: true,
    };
    state.store.put_tenant(tenant.clone()).await?;

    tracing::info!("Tenant {} ({}) created by {}", tenant.subdomain, tenant.id, session.subject_id);
    Ok(ApiResponse::created(tenant))
}
