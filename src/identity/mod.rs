//! Identity provider collaborator.
//!
//! The portal never owns credentials. It observes auth-state changes, reads
//! the custom claim set attached to a principal, and writes claims when
//! provisioning users.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::auth::ClaimSet;

pub mod memory;

pub use memory::MemoryIdentityProvider;

/// Provider-side identity before claim enrichment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Auth-state notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Principal),
    SignedOut,
}

#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("identity not found: {0}")]
    NotFound(String),

    #[error("email already registered: {0}")]
    EmailExists(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("identity provider rejected request: {0}")]
    Rejected(String),
}

/// Live registration for auth-state notifications. The registration is
/// released when this value is dropped.
pub struct AuthSubscription {
    events: mpsc::UnboundedReceiver<AuthEvent>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl AuthSubscription {
    pub fn new(events: mpsc::UnboundedReceiver<AuthEvent>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            events,
            release: Some(Box::new(release)),
        }
    }

    /// Next notification, `None` once the provider side is gone
    pub async fn next(&mut self) -> Option<AuthEvent> {
        self.events.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        self.events.close();
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSubscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register for auth-state changes. The current state is delivered first.
    fn subscribe(&self) -> AuthSubscription;

    /// Current custom claim set of a principal. May need a network round trip.
    async fn fetch_claims(&self, principal: &Principal) -> Result<ClaimSet, IdentityError>;

    /// Administrative: replace a principal's custom claims
    async fn set_custom_claims(&self, uid: &str, claims: ClaimSet) -> Result<(), IdentityError>;

    /// Administrative: create a password identity
    async fn create_user(&self, new: NewIdentity) -> Result<Principal, IdentityError>;

    /// Administrative: remove an identity
    async fn delete_user(&self, uid: &str) -> Result<(), IdentityError>;
}
