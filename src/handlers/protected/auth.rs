// handlers/protected/auth.rs - GET /api/auth/whoami handler

use axum::extract::{Extension, State};
use serde::Serialize;

use crate::handlers::utils::{host_tenant, reconcile};
use crate::middleware::{ApiResponse, ApiResult, AuthSession};
use crate::session::Session;
use crate::state::AppState;
use crate::store::{TenantRecord, UserRecord};
use crate::tenant::TenantContext;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmI {
    pub session: Session,
    /// Tenant owning the request host, if any
    pub tenant: Option<TenantRecord>,
    /// User document; absent for accounts created outside the portal
    pub profile: Option<UserRecord>,
}

/// GET /api/auth/whoami - Current session as derived from token claims
///
/// Role and tenant in `session` come from the signed claims. The user
/// document is returned alongside for display only.
pub async fn whoami(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(AuthSession(session)): Extension<AuthSession>,
) -> ApiResult<WhoAmI> {
    let tenant = host_tenant(&state, &context).await?;
    reconcile(&session, tenant.as_ref())?;

    let profile = state.store.user(&session.subject_id).await?;

    Ok(ApiResponse::success(WhoAmI {
        session,
        tenant,
        profile,
    }))
}
