use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use super::model::{Session, SessionError, SessionState};
use crate::config::SessionConfig;
use crate::identity::{AuthEvent, AuthSubscription, IdentityProvider, Principal};

/// Turns auth-state notifications into one published [`SessionState`].
#[derive(Clone)]
pub struct SessionMaterializer {
    provider: Arc<dyn IdentityProvider>,
    claim_fetch_timeout: Duration,
}

impl SessionMaterializer {
    pub fn new(provider: Arc<dyn IdentityProvider>, config: &SessionConfig) -> Self {
        Self {
            provider,
            claim_fetch_timeout: config.claim_fetch_timeout(),
        }
    }

    /// Subscribe to the provider and start materializing. The state starts
    /// as `Loading` and lives until the returned handle is torn down.
    pub fn activate(&self) -> SessionHandle {
        let (tx, rx) = watch::channel(SessionState::Loading);
        let cell = Arc::new(SessionCell::new(tx));

        let subscription = self.provider.subscribe();
        let driver = tokio::spawn(drive(
            subscription,
            self.provider.clone(),
            self.claim_fetch_timeout,
            cell.clone(),
        ));

        SessionHandle { rx, cell, driver }
    }
}

/// Consumer side of an activation. Dropping it tears the activation down.
pub struct SessionHandle {
    rx: watch::Receiver<SessionState>,
    cell: Arc<SessionCell>,
    driver: JoinHandle<()>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.rx.borrow().is_loading()
    }

    /// Read-only receiver for other consumers
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.rx.clone()
    }

    /// Wait for the next published state. `None` once the activation is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the state is no longer `Loading`
    pub async fn settled(&mut self) -> Option<SessionState> {
        let state = self.rx.wait_for(|state| !state.is_loading()).await.ok()?;
        Some((*state).clone())
    }

    /// Release the provider subscription. Nothing is published afterwards,
    /// including results of claim fetches already in flight.
    pub fn teardown(self) {}
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cell.close();
        self.driver.abort();
    }
}

struct Gate {
    generation: u64,
    closed: bool,
    in_flight: Option<AbortHandle>,
}

/// Publication point shared by the driver and claim fetches. A result may
/// only be published under the generation that was current when its
/// notification arrived.
struct SessionCell {
    gate: Mutex<Gate>,
    tx: watch::Sender<SessionState>,
}

impl SessionCell {
    fn new(tx: watch::Sender<SessionState>) -> Self {
        Self {
            gate: Mutex::new(Gate {
                generation: 0,
                closed: false,
                in_flight: None,
            }),
            tx,
        }
    }

    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a new generation, cancelling the previous claim fetch
    fn begin(&self) -> Option<u64> {
        let mut gate = self.gate();
        if gate.closed {
            return None;
        }
        gate.generation += 1;
        if let Some(previous) = gate.in_flight.take() {
            previous.abort();
        }
        Some(gate.generation)
    }

    fn track(&self, generation: u64, handle: AbortHandle) {
        let mut gate = self.gate();
        if gate.closed || gate.generation != generation {
            handle.abort();
        } else {
            gate.in_flight = Some(handle);
        }
    }

    fn publish(&self, generation: u64, state: SessionState) -> bool {
        let gate = self.gate();
        if gate.closed || gate.generation != generation {
            return false;
        }
        self.tx.send_replace(state);
        true
    }

    fn close(&self) {
        let mut gate = self.gate();
        gate.closed = true;
        gate.generation += 1;
        if let Some(in_flight) = gate.in_flight.take() {
            in_flight.abort();
        }
    }
}

async fn drive(
    mut subscription: AuthSubscription,
    provider: Arc<dyn IdentityProvider>,
    claim_fetch_timeout: Duration,
    cell: Arc<SessionCell>,
) {
    while let Some(event) = subscription.next().await {
        let Some(generation) = cell.begin() else {
            break;
        };

        match event {
            AuthEvent::SignedOut => {
                tracing::debug!("Session generation {} signed out", generation);
                cell.publish(generation, SessionState::SignedOut);
            }
            AuthEvent::SignedIn(principal) => {
                tracing::debug!("Session generation {} materializing {}", generation, principal.uid);
                let provider = provider.clone();
                let task_cell = cell.clone();
                let fetch = tokio::spawn(async move {
                    let state = materialize(provider.as_ref(), &principal, claim_fetch_timeout).await;
                    if !task_cell.publish(generation, state) {
                        tracing::debug!("Discarding stale session for {} (generation {})", principal.uid, generation);
                    }
                });
                cell.track(generation, fetch.abort_handle());
            }
        }
    }

    subscription.unsubscribe();
}

async fn materialize(provider: &dyn IdentityProvider, principal: &Principal, timeout: Duration) -> SessionState {
    let claims = match tokio::time::timeout(timeout, provider.fetch_claims(principal)).await {
        Ok(Ok(claims)) => claims,
        Ok(Err(e)) => {
            tracing::warn!("Claim fetch failed for {}: {}", principal.uid, e);
            return SessionState::Failed(SessionError::ClaimFetch(e.to_string()));
        }
        Err(_) => {
            tracing::warn!("Claim fetch for {} timed out after {:?}", principal.uid, timeout);
            return SessionState::Failed(SessionError::ClaimFetchTimeout(timeout));
        }
    };

    match Session::from_claims(principal.uid.clone(), principal.email.clone(), &claims) {
        Ok(session) => SessionState::SignedIn(session),
        Err(e) => {
            tracing::warn!("Rejecting claims for {}: {}", principal.uid, e);
            SessionState::Failed(SessionError::InvalidClaims(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ClaimError, ClaimSet, Role};
    use crate::identity::{IdentityError, NewIdentity};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::{mpsc, oneshot};

    type ClaimResult = Result<ClaimSet, IdentityError>;

    /// Provider whose notifications and claim fetches are driven by the test
    #[derive(Default)]
    struct ScriptedProvider {
        senders: Mutex<Vec<mpsc::UnboundedSender<AuthEvent>>>,
        claims: Mutex<HashMap<String, ClaimSet>>,
        pending: Mutex<HashMap<String, oneshot::Receiver<ClaimResult>>>,
        subscribes: AtomicUsize,
        released: Arc<AtomicBool>,
    }

    impl ScriptedProvider {
        fn emit(&self, event: AuthEvent) {
            for tx in self.senders.lock().unwrap().iter() {
                let _ = tx.send(event.clone());
            }
        }

        fn set_claims(&self, uid: &str, claims: ClaimSet) {
            self.claims.lock().unwrap().insert(uid.to_string(), claims);
        }

        /// Hold the next claim fetch for `uid` until the sender resolves it
        fn hold(&self, uid: &str) -> oneshot::Sender<ClaimResult> {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().insert(uid.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl IdentityProvider for ScriptedProvider {
        fn subscribe(&self) -> AuthSubscription {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::unbounded_channel();
            self.senders.lock().unwrap().push(tx);
            let released = self.released.clone();
            AuthSubscription::new(rx, move || released.store(true, Ordering::SeqCst))
        }

        async fn fetch_claims(&self, principal: &Principal) -> Result<ClaimSet, IdentityError> {
            let held = self.pending.lock().unwrap().remove(&principal.uid);
            if let Some(rx) = held {
                return rx.await.unwrap_or_else(|_| Err(IdentityError::Unavailable("dropped".into())));
            }
            self.claims
                .lock()
                .unwrap()
                .get(&principal.uid)
                .cloned()
                .ok_or_else(|| IdentityError::NotFound(principal.uid.clone()))
        }

        async fn set_custom_claims(&self, uid: &str, claims: ClaimSet) -> Result<(), IdentityError> {
            self.set_claims(uid, claims);
            Ok(())
        }

        async fn create_user(&self, _new: NewIdentity) -> Result<Principal, IdentityError> {
            Err(IdentityError::Rejected("not scripted".into()))
        }

        async fn delete_user(&self, _uid: &str) -> Result<(), IdentityError> {
            Ok(())
        }
    }

    fn principal(uid: &str) -> Principal {
        Principal {
            uid: uid.to_string(),
            email: format!("{}@archwood.sch", uid.to_lowercase()),
            display_name: None,
        }
    }

    fn setup(timeout_ms: u64) -> (Arc<ScriptedProvider>, SessionHandle) {
        let provider = Arc::new(ScriptedProvider::default());
        let materializer = SessionMaterializer::new(
            provider.clone(),
            &SessionConfig {
                claim_fetch_timeout_ms: timeout_ms,
            },
        );
        let handle = materializer.activate();
        (provider, handle)
    }

    async fn next_state(handle: &mut SessionHandle) -> SessionState {
        tokio::time::timeout(Duration::from_secs(5), handle.changed())
            .await
            .expect("no session state published")
            .expect("activation closed")
    }

    #[tokio::test]
    async fn principal_with_claims_becomes_session() {
        let (provider, mut handle) = setup(1_000);
        assert!(handle.is_loading());
        assert_eq!(provider.subscribes.load(Ordering::SeqCst), 1);

        provider.set_claims("A", ClaimSet::for_role(Role::Admin, Some("T1")));
        provider.emit(AuthEvent::SignedIn(principal("A")));

        let state = next_state(&mut handle).await;
        assert_eq!(
            state,
            SessionState::SignedIn(Session {
                subject_id: "A".to_string(),
                email: "a@archwood.sch".to_string(),
                role: Role::Admin,
                tenant_id: Some("T1".to_string()),
            })
        );
        assert!(!handle.is_loading());
    }

    #[tokio::test]
    async fn no_principal_is_signed_out() {
        let (provider, mut handle) = setup(1_000);
        provider.emit(AuthEvent::SignedOut);

        assert_eq!(handle.settled().await, Some(SessionState::SignedOut));
        assert!(handle.state().session().is_none());
    }

    #[tokio::test]
    async fn latest_notification_wins_over_late_fetch() {
        let (provider, mut handle) = setup(5_000);
        let release_a = provider.hold("A");
        let release_b = provider.hold("B");

        provider.emit(AuthEvent::SignedIn(principal("A")));
        provider.emit(AuthEvent::SignedIn(principal("B")));
        tokio::task::yield_now().await;

        let _ = release_b.send(Ok(ClaimSet::for_role(Role::Teacher, Some("T2"))));
        let state = next_state(&mut handle).await;
        assert_eq!(state.session().map(|s| s.subject_id.as_str()), Some("B"));

        // A resolves afterwards and must not overwrite B
        let _ = release_a.send(Ok(ClaimSet::for_role(Role::Admin, Some("T1"))));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state().session().map(|s| s.subject_id.as_str()), Some("B"));
    }

    #[tokio::test]
    async fn sign_out_supersedes_pending_fetch() {
        let (provider, mut handle) = setup(5_000);
        let release_a = provider.hold("A");

        provider.emit(AuthEvent::SignedIn(principal("A")));
        provider.emit(AuthEvent::SignedOut);
        assert_eq!(next_state(&mut handle).await, SessionState::SignedOut);

        let _ = release_a.send(Ok(ClaimSet::for_role(Role::Admin, Some("T1"))));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn claim_fetch_failure_is_not_signed_out() {
        let (provider, mut handle) = setup(1_000);
        let release = provider.hold("A");
        provider.emit(AuthEvent::SignedIn(principal("A")));
        tokio::task::yield_now().await;
        let _ = release.send(Err(IdentityError::Unavailable("provider outage".into())));

        let state = next_state(&mut handle).await;
        assert!(matches!(state, SessionState::Failed(SessionError::ClaimFetch(_))));
        assert_ne!(state, SessionState::SignedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn claim_fetch_timeout_is_a_failure() {
        let (provider, mut handle) = setup(250);
        let _never = provider.hold("A");
        provider.emit(AuthEvent::SignedIn(principal("A")));

        let state = handle.settled().await.unwrap();
        assert_eq!(
            state,
            SessionState::Failed(SessionError::ClaimFetchTimeout(Duration::from_millis(250)))
        );
    }

    #[tokio::test]
    async fn unknown_role_is_rejected_at_the_boundary() {
        let (provider, mut handle) = setup(1_000);
        let mut claims = ClaimSet::new();
        claims.insert("role", serde_json::json!("headmaster"));
        claims.insert("tenantId", serde_json::json!("T1"));
        provider.set_claims("A", claims);
        provider.emit(AuthEvent::SignedIn(principal("A")));

        let state = next_state(&mut handle).await;
        assert_eq!(
            state,
            SessionState::Failed(SessionError::InvalidClaims(ClaimError::UnknownRole("headmaster".into())))
        );
    }

    #[tokio::test]
    async fn teardown_releases_subscription_and_blocks_late_results() {
        let (provider, handle) = setup(5_000);
        let mut observer = handle.watch();
        let release = provider.hold("A");

        provider.emit(AuthEvent::SignedIn(principal("A")));
        tokio::task::yield_now().await;

        handle.teardown();
        let _ = release.send(Ok(ClaimSet::for_role(Role::Admin, Some("T1"))));
        provider.emit(AuthEvent::SignedOut);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(provider.released.load(Ordering::SeqCst));
        assert!(!matches!(observer.has_changed(), Ok(true)));
        assert_eq!(*observer.borrow_and_update(), SessionState::Loading);
    }

    #[test]
    fn closed_cell_rejects_publication() {
        let (tx, rx) = watch::channel(SessionState::Loading);
        let cell = SessionCell::new(tx);

        let first = cell.begin().unwrap();
        let second = cell.begin().unwrap();
        assert!(!cell.publish(first, SessionState::SignedOut));
        assert!(cell.publish(second, SessionState::SignedOut));

        cell.close();
        assert!(cell.begin().is_none());
        assert!(!cell.publish(second, SessionState::Loading));
        assert_eq!(*rx.borrow(), SessionState::SignedOut);
    }
}
