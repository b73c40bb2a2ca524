//! Restore, login, and logout orchestration.
//!
//! [`SessionController`] is the only place that mutates the
//! [`SessionContainer`] and writes to the [`SessionStore`]. Every other
//! component reads.

use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell, watch};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::exchange::{ExchangeClient, ExchangeError};
use crate::fetch::ResourceFetcher;
use crate::resources::{FetchStatus, ResourceKind, ResourceLists, ResourceSlot};
use crate::session::Session;
use crate::state::{ActiveSession, SessionContainer, SessionState};
use crate::store::{KeyValueStore, SessionStore};
use crate::types::{BearerToken, InstallId};

/// What the identity-provider widget reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// Sign-in succeeded; opaque provider credential.
    Credential(String),
    /// Sign-in failed or was cancelled.
    Failed { reason: String },
}

impl From<Option<String>> for ProviderOutcome {
    fn from(credential: Option<String>) -> Self {
        match credential {
            Some(credential) => Self::Credential(credential),
            None => Self::Failed {
                reason: "no credential".into(),
            },
        }
    }
}

/// Coarse lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// [`SessionController::start`] has not completed yet.
    Uninitialized,
    NoSession,
    ActiveSession,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LifecycleError {
    /// Login or logout before startup restore finished.
    #[error("session lifecycle not started")]
    NotStarted,

    #[error("identity provider reported a failure: {0}")]
    Provider(String),

    #[error("login failed: {0}")]
    Exchange(#[from] ExchangeError),
}

/// Orchestrates the session lifecycle.
///
/// ```rust,ignore
/// let store = config.file_session_store()?;
/// let controller = SessionController::from_config(&config, store);
///
/// controller.start().await;
/// controller.login(&google_credential).await?;
/// let lists = controller.resources();
/// controller.logout().await?;
/// ```
pub struct SessionController<K> {
    inner: Arc<Inner<K>>,
}

// Manual Clone: avoid derive adding a `K: Clone` bound.
impl<K> Clone for SessionController<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<K> {
    store: SessionStore<K>,
    container: SessionContainer,
    exchange: ExchangeClient,
    fetcher: ResourceFetcher,
    resources: watch::Sender<ResourceLists>,
    started: OnceCell<()>,
    // Serializes restore, login commit, and logout.
    transitions: Mutex<()>,
}

impl<K: KeyValueStore> SessionController<K> {
    #[must_use]
    pub fn new(store: SessionStore<K>, exchange: ExchangeClient, fetcher: ResourceFetcher) -> Self {
        let (resources, _rx) = watch::channel(ResourceLists::default());
        Self {
            inner: Arc::new(Inner {
                store,
                container: SessionContainer::new(),
                exchange,
                fetcher,
                resources,
                started: OnceCell::new(),
                transitions: Mutex::new(()),
            }),
        }
    }

    /// Controller talking to the backend described by `config`.
    #[must_use]
    pub fn from_config(config: &ClientConfig, store: SessionStore<K>) -> Self {
        Self::new(
            store,
            ExchangeClient::new(config),
            ResourceFetcher::new(config),
        )
    }

    /// Restore the persisted session, if any.
    ///
    /// Runs the restore exactly once; later calls return the current state.
    pub async fn start(&self) -> SessionState {
        self.inner
            .started
            .get_or_init(|| async {
                let _guard = self.inner.transitions.lock().await;
                match self.inner.store.load().await {
                    Some(session) => {
                        tracing::info!(display_name = %session.display_name(), "Restored persisted session");
                        let active = self.install(session);
                        self.spawn_fetches(&active);
                    }
                    None => tracing::debug!("No persisted session, starting signed out"),
                }
            })
            .await;

        self.inner.container.current()
    }

    /// Exchange `provider_credential` and sign in with the resulting session.
    ///
    /// A second login while signed in fully replaces the previous session.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::NotStarted`] before [`start`](Self::start) finished
    /// - [`LifecycleError::Exchange`] if the exchange failed; the current
    ///   session, if any, and its persisted record are left untouched, but its
    ///   resource lists are emptied and marked failed
    pub async fn login(&self, provider_credential: &str) -> Result<Session, LifecycleError> {
        self.ensure_started()?;

        let session = match self.inner.exchange.exchange(provider_credential).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Credential exchange failed");
                self.fail_resources().await;
                return Err(e.into());
            }
        };

        let _guard = self.inner.transitions.lock().await;
        let active = self.install(session.clone());
        if let Err(e) = self.inner.store.save(&session).await {
            tracing::warn!(error = %e, "Failed to persist session; it will not survive a restart");
        }
        self.spawn_fetches(&active);

        tracing::info!(
            display_name = %session.display_name(),
            install_id = %active.install_id(),
            "Login successful"
        );
        Ok(session)
    }

    /// Route the identity-provider widget's result.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Provider`] for a failed sign-in, otherwise as
    /// [`login`](Self::login).
    pub async fn handle_provider_outcome(
        &self,
        outcome: ProviderOutcome,
    ) -> Result<Session, LifecycleError> {
        match outcome {
            ProviderOutcome::Credential(credential) => self.login(&credential).await,
            ProviderOutcome::Failed { reason } => {
                tracing::warn!(reason = %reason, "Login failed at identity provider");
                Err(LifecycleError::Provider(reason))
            }
        }
    }

    /// Sign out: clear the session, the persisted record, and the resource lists.
    ///
    /// Responses still in flight for the old session are dropped on arrival.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotStarted`] before [`start`](Self::start) finished.
    pub async fn logout(&self) -> Result<(), LifecycleError> {
        self.ensure_started()?;

        let _guard = self.inner.transitions.lock().await;
        self.inner.container.clear();
        if let Err(e) = self.inner.store.clear().await {
            tracing::warn!(error = %e, "Failed to erase persisted session");
        }
        self.inner.resources.send_replace(ResourceLists::default());

        tracing::info!("Logged out");
        Ok(())
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        if !self.inner.started.initialized() {
            LifecyclePhase::Uninitialized
        } else if self.inner.container.current().is_active() {
            LifecyclePhase::ActiveSession
        } else {
            LifecyclePhase::NoSession
        }
    }

    /// Snapshot of the session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.container.current()
    }

    /// Receiver notified on every session transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.container.subscribe()
    }

    /// Resource lists of the current session.
    ///
    /// Lists that belong to a session that is no longer installed read as empty.
    #[must_use]
    pub fn resources(&self) -> ResourceLists {
        let lists = self.inner.resources.borrow().clone();
        match lists.owner() {
            Some(owner) if self.inner.container.is_current(owner) => lists,
            _ => ResourceLists::default(),
        }
    }

    /// Receiver notified whenever a resource list changes.
    ///
    /// The raw value may still hold the lists of a session that was just
    /// logged out or replaced (e.g. while logout erases the persisted record).
    /// Use the receiver as a change signal and read through
    /// [`resources`](Self::resources), or compare
    /// [`ResourceLists::owner`] with [`SessionState::install_id`].
    #[must_use]
    pub fn subscribe_resources(&self) -> watch::Receiver<ResourceLists> {
        self.inner.resources.subscribe()
    }

    /// Read-only access to the persisted record.
    #[must_use]
    pub fn store(&self) -> &SessionStore<K> {
        &self.inner.store
    }

    fn ensure_started(&self) -> Result<(), LifecycleError> {
        if self.inner.started.initialized() {
            Ok(())
        } else {
            Err(LifecycleError::NotStarted)
        }
    }

    /// Install into the container and hand the resource lists to the new installation.
    fn install(&self, session: Session) -> ActiveSession {
        let active = self.inner.container.install(session);
        self.inner
            .resources
            .send_replace(ResourceLists::loading_for(active.install_id()));
        active
    }

    /// Empty the current session's lists after a failed exchange.
    ///
    /// Results still in flight for that session are dropped on arrival.
    async fn fail_resources(&self) {
        let _guard = self.inner.transitions.lock().await;
        let Some(owner) = self.inner.container.current().install_id() else {
            return;
        };
        self.inner
            .resources
            .send_if_modified(|lists| lists.apply(owner, ResourceLists::fail_all));
    }

    fn spawn_fetches(&self, active: &ActiveSession) {
        let owner = active.install_id();
        let session = active.session();

        let Some(token) = session.usable_token() else {
            tracing::warn!(
                display_name = %session.display_name(),
                "Session has no bearer value, skipping protected fetches"
            );
            self.inner
                .resources
                .send_if_modified(|lists| lists.apply(owner, ResourceLists::fail_all));
            return;
        };

        for kind in ResourceKind::ALL {
            let inner = Arc::clone(&self.inner);
            let token = token.clone();
            tokio::spawn(async move { inner.load_resource(kind, owner, token).await });
        }
    }
}

impl<K: KeyValueStore> Inner<K> {
    async fn load_resource(&self, kind: ResourceKind, owner: InstallId, token: BearerToken) {
        tracing::debug!(resource = %kind, install_id = %owner, "Fetching resource");
        match kind {
            ResourceKind::Users => {
                let result = self.fetcher.users(&token).await;
                self.settle(kind, owner, result, ResourceLists::users_mut);
            }
            ResourceKind::Races => {
                let result = self.fetcher.races(&token).await;
                self.settle(kind, owner, result, ResourceLists::races_mut);
            }
        }
    }

    /// Apply a fetch result unless the installation it was issued for is gone.
    fn settle<T>(
        &self,
        kind: ResourceKind,
        owner: InstallId,
        result: Result<Vec<T>, Error>,
        slot: fn(&mut ResourceLists) -> &mut ResourceSlot<T>,
    ) {
        match &result {
            Ok(items) => tracing::debug!(resource = %kind, count = items.len(), "Resource loaded"),
            Err(e) => tracing::warn!(resource = %kind, error = %e, "Resource fetch failed"),
        }

        // Each slot takes one result per installation, and only while loading.
        let applied = self.resources.send_if_modified(|lists| {
            slot(lists).status() == FetchStatus::Loading
                && lists.apply(owner, |l| slot(l).settle(result))
        });
        if !applied {
            tracing::debug!(resource = %kind, install_id = %owner, "Discarding stale resource response");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::BoxError;
    use crate::store::{DEFAULT_SESSION_KEY, MemoryStore};

    fn controller<K: KeyValueStore>(server_uri: &str, backend: K) -> SessionController<K> {
        let config = ClientConfig::new(server_uri.parse().unwrap());
        SessionController::from_config(&config, SessionStore::new(backend))
    }

    async fn settled<K: KeyValueStore>(controller: &SessionController<K>) -> ResourceLists {
        let mut rx = controller.subscribe_resources();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(ResourceLists::is_settled))
            .await
            .expect("resource fetch did not settle")
            .expect("resource channel closed");
        controller.resources()
    }

    async fn mount_users(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/races"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }

    /// Memory store whose erase takes a while.
    struct SlowRemove(MemoryStore);

    impl KeyValueStore for SlowRemove {
        async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
            self.0.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), BoxError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            self.0.remove(key).await
        }
    }

    #[tokio::test]
    async fn phase_is_uninitialized_until_start() {
        let controller = controller("http://127.0.0.1:1", MemoryStore::new());
        assert_eq!(controller.phase(), LifecyclePhase::Uninitialized);

        controller.start().await;
        assert_eq!(controller.phase(), LifecyclePhase::NoSession);
    }

    #[tokio::test]
    async fn login_and_logout_require_start() {
        let controller = controller("http://127.0.0.1:1", MemoryStore::new());

        assert!(matches!(
            controller.login("tok123").await,
            Err(LifecycleError::NotStarted)
        ));
        assert!(matches!(controller.logout().await, Err(LifecycleError::NotStarted)));
    }

    #[tokio::test]
    async fn restore_runs_once() {
        let backend = MemoryStore::new();
        let controller = controller("http://127.0.0.1:1", backend.clone());

        controller.start().await;
        backend.insert_raw(DEFAULT_SESSION_KEY, r#"{"displayName":"Ana"}"#);

        assert_eq!(controller.start().await, SessionState::NoSession);
    }

    #[tokio::test]
    async fn provider_failure_changes_nothing() {
        let backend = MemoryStore::new();
        backend.insert_raw(DEFAULT_SESSION_KEY, r#"{"displayName":"Ana"}"#);
        let controller = controller("http://127.0.0.1:1", backend.clone());
        controller.start().await;
        let before = controller.state();

        let err = controller
            .handle_provider_outcome(ProviderOutcome::from(None))
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Provider(_)));
        assert_eq!(controller.state(), before);
        assert!(backend.peek(DEFAULT_SESSION_KEY).is_some());
    }

    #[tokio::test]
    async fn failed_exchange_keeps_prior_session_but_clears_lists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/google/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        mount_users(&server).await;

        let record = r#"{"displayName":"Ana","bearerToken":"abc"}"#;
        let backend = MemoryStore::new();
        backend.insert_raw(DEFAULT_SESSION_KEY, record);
        let controller = controller(&server.uri(), backend.clone());
        controller.start().await;
        assert_eq!(settled(&controller).await.users().items().len(), 1);
        let before = controller.state();

        let err = controller.login("tok123").await.unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Exchange(ExchangeError::Transport(_))
        ));
        assert_eq!(controller.state(), before);
        assert_eq!(backend.peek(DEFAULT_SESSION_KEY).as_deref(), Some(record));

        let lists = controller.resources();
        assert_eq!(lists.owner(), before.install_id());
        assert!(lists.users().is_empty());
        assert_eq!(lists.users().status(), FetchStatus::Failed);
        assert_eq!(lists.races().status(), FetchStatus::Failed);
    }

    #[tokio::test]
    async fn failed_exchange_while_signed_out_leaves_lists_idle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/google/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credential"))
            .mount(&server)
            .await;

        let controller = controller(&server.uri(), MemoryStore::new());
        controller.start().await;

        assert!(controller.login("tok123").await.is_err());
        assert_eq!(controller.phase(), LifecyclePhase::NoSession);
        assert_eq!(*controller.subscribe_resources().borrow(), ResourceLists::default());
    }

    #[tokio::test]
    async fn lists_read_empty_while_logout_erases_record() {
        let server = MockServer::start().await;
        mount_users(&server).await;

        let backend = MemoryStore::new();
        backend.insert_raw(DEFAULT_SESSION_KEY, r#"{"displayName":"Ana","bearerToken":"abc"}"#);
        let controller = controller(&server.uri(), SlowRemove(backend.clone()));
        controller.start().await;
        assert!(!settled(&controller).await.users().is_empty());

        let logout = tokio::spawn({
            let controller = controller.clone();
            async move { controller.logout().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Record erase still pending: the raw channel lags, the view does not.
        assert!(backend.peek(DEFAULT_SESSION_KEY).is_some());
        assert_eq!(controller.phase(), LifecyclePhase::NoSession);
        assert_eq!(controller.resources(), ResourceLists::default());
        assert!(!controller.subscribe_resources().borrow().users().is_empty());

        logout.await.unwrap().unwrap();
        assert_eq!(backend.peek(DEFAULT_SESSION_KEY), None);
        assert_eq!(*controller.subscribe_resources().borrow(), ResourceLists::default());
    }

    #[tokio::test]
    async fn logout_during_exchange_does_not_cancel_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/google/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "Ana", "token": "abc"}))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        mount_users(&server).await;

        let backend = MemoryStore::new();
        let controller = controller(&server.uri(), backend.clone());
        controller.start().await;

        let login = tokio::spawn({
            let controller = controller.clone();
            async move { controller.login("tok123").await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.logout().await.unwrap();
        assert_eq!(controller.phase(), LifecyclePhase::NoSession);

        let session = login.await.unwrap().unwrap();
        assert_eq!(controller.state().session(), Some(&session));
        assert!(backend.peek(DEFAULT_SESSION_KEY).is_some());
        assert_eq!(settled(&controller).await.users().items().len(), 1);
    }

    #[tokio::test]
    async fn token_less_login_marks_lists_failed_without_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/google/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Ana"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let controller = controller(&server.uri(), MemoryStore::new());
        controller.start().await;
        let session = controller.login("tok123").await.unwrap();

        assert!(session.bearer_token().is_none());
        assert_eq!(controller.phase(), LifecyclePhase::ActiveSession);
        let lists = controller.resources();
        assert!(lists.is_settled());
        assert!(lists.users().is_empty());
        assert!(lists.races().is_empty());
    }

    #[test]
    fn provider_outcome_from_option() {
        assert_eq!(
            ProviderOutcome::from(Some("cred".to_string())),
            ProviderOutcome::Credential("cred".into())
        );
        assert!(matches!(ProviderOutcome::from(None), ProviderOutcome::Failed { .. }));
    }
}
