// handlers/protected/users.rs - Tenant user management
//
// GET  /api/users            → users of the scoped tenant
// POST /api/users            → provision a new account (201)

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::handlers::utils::{host_tenant, reconcile, scoped_tenant_id};
use crate::middleware::{ApiResponse, ApiResult, AuthSession};
use crate::provisioning::CreateUserRequest;
use crate::state::AppState;
use crate::store::UserRecord;
use crate::tenant::TenantContext;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub tenant_id: Option<String>,
}

/// GET /api/users - List users in a tenant
///
/// The tenant is `?tenantId=` when given, otherwise the host tenant,
/// otherwise the caller's own.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Vec<UserRecord>> {
    let host = host_tenant(&state, &context).await?;
    reconcile(&session, host.as_ref())?;

    let tenant_id = scoped_tenant_id(query.tenant_id.as_deref(), host.as_ref(), &session)
        .ok_or_else(|| ApiError::bad_request("tenantId is required"))?;

    let users = state.provisioner.list_users(&session, &tenant_id).await?;
    Ok(ApiResponse::success(users))
}

/// POST /api/users - Create an account in a tenant
///
/// Expected Input:
/// ```json
/// { "email": "t@school.io", "name": "Ada", "role": "teacher", "tenantId": "T1" }
/// ```
/// `tenantId` falls back to the host tenant, then the caller's own.
pub async fn create_user(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Json(mut request): Json<CreateUserRequest>,
) -> ApiResult<UserRecord> {
    let host = host_tenant(&state, &context).await?;
    reconcile(&session, host.as_ref())?;

    request.tenant_id = scoped_tenant_id(request.tenant_id.as_deref(), host.as_ref(), &session);

    let user = state.provisioner.create_user(&session, request).await?;

    tracing::info!(
        "{} created {} {} in tenant {:?}",
        session.subject_id,
        user.role,
        user.uid,
        user.tenant_id
    );
    Ok(ApiResponse::created(user))
}
