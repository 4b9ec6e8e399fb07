use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::{AuthEvent, AuthSubscription, IdentityError, IdentityProvider, NewIdentity, Principal};
use crate::auth::{issue_token, ClaimSet, Claims};
use crate::config::SecurityConfig;

struct StoredIdentity {
    principal: Principal,
    salt: String,
    password_hash: String,
    claims: ClaimSet,
}

struct Inner {
    security: SecurityConfig,
    users: RwLock<HashMap<String, StoredIdentity>>,
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<AuthEvent>>>,
    current: Mutex<Option<Principal>>,
    next_subscriber: AtomicU64,
}

/// In-process identity provider used for local development and tests.
///
/// Tracks a single "current" principal the way a client SDK does and fans
/// auth-state changes out to every subscriber.
#[derive(Clone)]
pub struct MemoryIdentityProvider {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl MemoryIdentityProvider {
    pub fn new(security: SecurityConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                security,
                users: RwLock::new(HashMap::new()),
                subscribers: Mutex::new(HashMap::new()),
                current: Mutex::new(None),
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Principal, IdentityError> {
        let principal = {
            let users = self.inner.users.read().await;
            let stored = users
                .values()
                .find(|u| u.principal.email.eq_ignore_ascii_case(email))
                .ok_or(IdentityError::InvalidCredentials)?;

            if hash_password(&stored.salt, password) != stored.password_hash {
                return Err(IdentityError::InvalidCredentials);
            }
            stored.principal.clone()
        };

        self.set_current(Some(principal.clone()));
        Ok(principal)
    }

    pub fn sign_out(&self) {
        self.set_current(None);
    }

    /// Signed bearer token carrying the principal's current claims
    pub async fn id_token(&self, uid: &str) -> Result<String, IdentityError> {
        let users = self.inner.users.read().await;
        let stored = users
            .get(uid)
            .ok_or_else(|| IdentityError::NotFound(uid.to_string()))?;

        let claims = Claims::new(
            stored.principal.uid.clone(),
            stored.principal.email.clone(),
            stored.claims.clone(),
            self.inner.security.jwt_expiry_hours,
        );

        issue_token(&claims, &self.inner.security).map_err(|e| IdentityError::Rejected(e.to_string()))
    }

    fn set_current(&self, principal: Option<Principal>) {
        let mut current = lock(&self.inner.current);
        *current = principal.clone();

        let event = match principal {
            Some(p) => AuthEvent::SignedIn(p),
            None => AuthEvent::SignedOut,
        };

        // Broadcast while holding `current` so a concurrent subscribe cannot
        // miss or reorder this event
        lock(&self.inner.subscribers).retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn subscribe(&self) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);

        {
            let current = lock(&self.inner.current);
            let initial = match current.as_ref() {
                Some(p) => AuthEvent::SignedIn(p.clone()),
                None => AuthEvent::SignedOut,
            };
            let _ = tx.send(initial);
            lock(&self.inner.subscribers).insert(id, tx);
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        AuthSubscription::new(rx, move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.subscribers).remove(&id);
                tracing::debug!("Auth subscription {} released", id);
            }
        })
    }

    async fn fetch_claims(&self, principal: &Principal) -> Result<ClaimSet, IdentityError> {
        let users = self.inner.users.read().await;
        users
            .get(&principal.uid)
            .map(|u| u.claims.clone())
            .ok_or_else(|| IdentityError::NotFound(principal.uid.clone()))
    }

    async fn set_custom_claims(&self, uid: &str, claims: ClaimSet) -> Result<(), IdentityError> {
        let mut users = self.inner.users.write().await;
        let stored = users
            .get_mut(uid)
            .ok_or_else(|| IdentityError::NotFound(uid.to_string()))?;
        stored.claims = claims;
        Ok(())
    }

    async fn create_user(&self, new: NewIdentity) -> Result<Principal, IdentityError> {
        let email = new.email.trim().to_ascii_lowercase();
        if new.password.len() < 6 {
            return Err(IdentityError::Rejected("password must be at least 6 characters".to_string()));
        }

        let mut users = self.inner.users.write().await;
        if users.values().any(|u| u.principal.email == email) {
            return Err(IdentityError::EmailExists(email));
        }

        let salt: String = rand::thread_rng()
            .gen::<[u8; 16]>()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();

        let principal = Principal {
            uid: Uuid::new_v4().simple().to_string(),
            email,
            display_name: new.display_name,
        };

        users.insert(
            principal.uid.clone(),
            StoredIdentity {
                principal: principal.clone(),
                password_hash: hash_password(&salt, &new.password),
                salt,
                claims: ClaimSet::new(),
            },
        );

        Ok(principal)
    }

    async fn delete_user(&self, uid: &str) -> Result<(), IdentityError> {
        let removed = self.inner.users.write().await.remove(uid);
        if removed.is_none() {
            return Err(IdentityError::NotFound(uid.to_string()));
        }

        let signed_in = lock(&self.inner.current).as_ref().map(|p| p.uid == uid).unwrap_or(false);
        if signed_in {
            self.set_current(None);
        }
        Ok(())
    }
}
