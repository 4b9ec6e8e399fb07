// handlers/public/tenant.rs - Tenant lookup and branding for the current host
//
// GET /api/tenant            → tenant record for the host subdomain
// GET /api/tenant/theme.css  → branding as CSS custom properties

use axum::{
    extract::{Extension, State},
    http::header,
    response::IntoResponse,
};

use crate::error::ApiError;
use crate::handlers::utils::host_tenant;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::store::TenantRecord;
use crate::tenant::TenantContext;
use crate::theme;

/// GET /api/tenant - Tenant owning the request host
///
/// Platform, preview and foreign hosts have no tenant and get a 404, as do
/// subdomains without an active tenant record.
pub async fn current_tenant(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
) -> ApiResult<TenantRecord> {
    let tenant = host_tenant(&state, &context)
        .await?
        .ok_or_else(|| ApiError::not_found("Host does not belong to a tenant"))?;

    Ok(ApiResponse::success(tenant))
}

/// GET /api/tenant/theme.css - Host tenant branding
pub async fn theme_css(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = host_tenant(&state, &context)
        .await?
        .ok_or_else(|| ApiError::not_found("Host does not belong to a tenant"))?;

    let css = theme::theme_css(&tenant.branding)?;

    Ok(([(header::CONTENT_TYPE, "text/css; charset=utf-8")], css))
}
