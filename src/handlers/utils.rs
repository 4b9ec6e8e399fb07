// handlers/utils.rs - Tenant lookups shared across handler tiers

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;
use crate::store::TenantRecord;
use crate::tenant::TenantContext;

/// Load the tenant named by the request host.
///
/// `Ok(None)` when the host carries no tenant subdomain. A subdomain that
/// does not match an active tenant is a 404.
pub async fn host_tenant(state: &AppState, context: &TenantContext) -> Result<Option<TenantRecord>, ApiError> {
    let Some(subdomain) = context.subdomain() else {
        return Ok(None);
    };

    match state.store.tenant_by_subdomain(subdomain).await? {
        Some(tenant) => Ok(Some(tenant)),
        None => {
            tracing::debug!("No active tenant for subdomain '{}'", subdomain);
            Err(ApiError::not_found(format!("Tenant '{}' not found", subdomain)))
        }
    }
}

/// A signed-in user on a tenant host must belong to that tenant,
/// unless they are a superadmin.
pub fn reconcile(session: &Session, host: Option<&TenantRecord>) -> Result<(), ApiError> {
    match host {
        Some(tenant) if !session.can_access_tenant(&tenant.id) => Err(ApiError::forbidden(format!(
            "Session is not a member of tenant '{}'",
            tenant.subdomain
        ))),
        _ => Ok(()),
    }
}

/// Tenant a request operates on: explicit parameter, then host, then session
pub fn scoped_tenant_id(explicit: Option<&str>, host: Option<&TenantRecord>, session: &Session) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| host.map(|tenant| tenant.id.clone()))
        .or_else(|| session.tenant_id.clone())
}
