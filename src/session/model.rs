use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{ClaimError, ClaimSet, Role};

/// Authenticated identity as seen by the portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub subject_id: String,
    pub email: String,
    pub role: Role,
    pub tenant_id: Option<String>,
}

impl Session {
    /// Build a session from principal attributes and the signed claim set.
    /// Role and tenant are taken from the claims and nowhere else.
    pub fn from_claims(
        subject_id: impl Into<String>,
        email: impl Into<String>,
        claims: &ClaimSet,
    ) -> Result<Self, ClaimError> {
        let role = claims.role()?;
        let tenant_id = claims.tenant_id().map(str::to_string);

        if role.requires_tenant() && tenant_id.is_none() {
            return Err(ClaimError::MissingTenant(role));
        }

        Ok(Self {
            subject_id: subject_id.into(),
            email: email.into(),
            role,
            tenant_id,
        })
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == Role::Superadmin
    }

    /// Superadmins reach every tenant, everyone else only their own
    pub fn can_access_tenant(&self, tenant_id: &str) -> bool {
        self.is_superadmin() || self.tenant_id.as_deref() == Some(tenant_id)
    }

    pub fn can_manage_users(&self, tenant_id: &str) -> bool {
        match self.role {
            Role::Superadmin => true,
            Role::Admin => self.tenant_id.as_deref() == Some(tenant_id),
            Role::Teacher | Role::Parent => false,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("claim set fetch failed: {0}")]
    ClaimFetch(String),

    #[error("claim set fetch timed out after {0:?}")]
    ClaimFetchTimeout(Duration),

    #[error("invalid claim set: {0}")]
    InvalidClaims(#[from] ClaimError),
}

/// Published session value. Replaced wholesale on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Subscribed, first notification not yet materialized
    Loading,
    SignedOut,
    SignedIn(Session),
    /// A principal is present but its claims could not be materialized.
    /// Not the same as signed out.
    Failed(SessionError),
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::SignedIn(session) => Some(session),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            SessionState::Failed(err) => Some(err),
            _ => None,
        }
    }
}
