//! Consumer-facing session surface.

use std::sync::Arc;

use authsession_core::{
    Credential, IdentityFetcher, PermissionsFetcher, Session, SessionReader, SessionState,
    SubscriptionId,
};
use authsession_store::SessionStore;

use crate::controller::{BootstrapController, BootstrapError, BootstrapPhase};
use crate::run::RunId;

/// The only handle the rest of an application uses to read or end a session.
///
/// Cheap to clone; pass it explicitly to whatever needs session data.
#[derive(Clone)]
pub struct SessionFacade {
    state: Arc<SessionState>,
    controller: Arc<BootstrapController>,
}

impl SessionFacade {
    /// Create a facade whose state is seeded from `store`.
    #[must_use]
    pub fn new(
        store: SessionStore,
        identity: Arc<dyn IdentityFetcher>,
        permissions: Arc<dyn PermissionsFetcher>,
    ) -> Self {
        let state = Arc::new(SessionState::with_credential(store.get()));
        Self::with_state(state, store, identity, permissions)
    }

    /// Create a facade whose permissions fetcher reads the session it serves.
    ///
    /// `permissions` receives a read-only [`SessionReader`], e.g. for resolving
    /// the bearer token of the current credential.
    #[must_use]
    pub fn with_permissions<P>(
        store: SessionStore,
        identity: Arc<dyn IdentityFetcher>,
        permissions: P,
    ) -> Self
    where
        P: FnOnce(SessionReader) -> Arc<dyn PermissionsFetcher>,
    {
        let state = Arc::new(SessionState::with_credential(store.get()));
        let permissions = permissions(state.reader());
        Self::with_state(state, store, identity, permissions)
    }

    /// Create a facade over an existing state.
    ///
    /// [`Self::bootstrap`] replaces whatever credential `state` holds with the
    /// one in `store`.
    #[must_use]
    pub fn with_state(
        state: Arc<SessionState>,
        store: SessionStore,
        identity: Arc<dyn IdentityFetcher>,
        permissions: Arc<dyn PermissionsFetcher>,
    ) -> Self {
        let controller =
            BootstrapController::new(Arc::clone(&state), store, identity, permissions);
        Self { state, controller }
    }

    /// Start the one-time startup bootstrap.
    ///
    /// # Errors
    /// Returns error if bootstrap was already started or no Tokio runtime is running.
    pub fn bootstrap(&self) -> Result<Option<RunId>, BootstrapError> {
        self.controller.bootstrap()
    }

    /// Current session snapshot.
    #[must_use]
    pub fn current(&self) -> Session {
        self.state.snapshot()
    }

    /// Store a new credential in memory and durably.
    ///
    /// A credential with an empty or blank token logs out instead, clearing
    /// both the session and the stored credential.
    pub fn save(&self, credential: Credential) {
        self.controller.save(credential);
    }

    /// Log out: clears the session and the stored credential.
    pub fn logout(&self) {
        self.controller.logout();
    }

    /// True until the startup bootstrap has settled.
    #[must_use]
    pub fn is_bootstrapping(&self) -> bool {
        self.controller.phase().is_bootstrapping()
    }

    /// Current bootstrap phase.
    #[must_use]
    pub fn phase(&self) -> BootstrapPhase {
        self.controller.phase()
    }

    /// Wait until [`Self::is_bootstrapping`] turns false.
    pub async fn wait_until_bootstrapped(&self) -> BootstrapPhase {
        self.controller.wait_until_settled().await
    }

    /// Subscribe to session changes.
    ///
    /// The observer runs synchronously on the mutating thread, after the
    /// change is committed. It may call [`Self::save`] or [`Self::logout`].
    pub fn on_change<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.state.subscribe(observer)
    }

    /// Remove an observer registered with [`Self::on_change`].
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }

    /// Async stream of session snapshots.
    #[must_use]
    pub fn changes(&self) -> futures::stream::BoxStream<'static, Session> {
        self.state.changes()
    }
}
