//! Observable in-memory session state.

use std::sync::{Arc, PoisonError, RwLock};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{Credential, Identity, PermissionSet, Session};

/// Capacity of the async change feed; slow receivers skip missed snapshots.
const CHANGE_CAPACITY: usize = 64;

/// Handle returned by [`SessionState::subscribe`].
pub type SubscriptionId = Uuid;

/// Synchronous change callback.
pub type Observer = Arc<dyn Fn(&Session) + Send + Sync>;

/// A session mutation whose observers have not run yet.
///
/// Returned by the `stage_*` methods so an owner that serializes mutations
/// behind its own lock can release that lock before observers run. Hand it to
/// [`SessionState::publish`].
#[derive(Debug, Default)]
#[must_use = "observers only run once the change is published"]
pub struct StagedChange {
    accepted: bool,
    snapshot: Option<Session>,
}

impl StagedChange {
    /// Whether the mutation was accepted (identity/permissions need a credential).
    #[must_use]
    pub const fn accepted(&self) -> bool {
        self.accepted
    }

    /// Whether publishing will notify anyone, i.e. the session actually changed.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        self.snapshot.is_some()
    }
}

/// Read-only view of a [`SessionState`] for collaborators outside the core.
#[derive(Clone)]
pub struct SessionReader {
    state: Arc<SessionState>,
}

impl SessionReader {
    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.snapshot()
    }

    /// Current credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.state.credential()
    }
}

/// Single source of truth for the current [`Session`].
///
/// Every mutation that changes the session notifies observers synchronously,
/// on the mutating thread, after the internal lock is released. Observers may
/// call back into the session owner. Async consumers can use
/// [`SessionState::changes`] instead.
pub struct SessionState {
    session: RwLock<Session>,
    observers: RwLock<Vec<(SubscriptionId, Observer)>>,
    sender: broadcast::Sender<Session>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Create an empty session state.
    #[must_use]
    pub fn new() -> Self {
        Self::with_credential(None)
    }

    /// Create a state seeded with a cold-start credential.
    #[must_use]
    pub fn with_credential(credential: Option<Credential>) -> Self {
        let (sender, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            session: RwLock::new(Session {
                credential,
                identity: None,
                permissions: None,
            }),
            observers: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Read-only handle that cannot mutate the session.
    #[must_use]
    pub fn reader(self: &Arc<Self>) -> SessionReader {
        SessionReader {
            state: Arc::clone(self),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .credential
            .clone()
    }

    /// Replace the credential. Clearing it also clears identity and permissions.
    pub fn set_credential(&self, credential: Option<Credential>) {
        self.publish(self.stage_credential(credential));
    }

    /// Set the identity. Refused (returns `false`) while no credential is present.
    pub fn set_identity(&self, identity: Option<Identity>) -> bool {
        self.publish(self.stage_identity(identity))
    }

    /// Set the permissions. Refused (returns `false`) while no credential is present.
    pub fn set_permissions(&self, permissions: Option<PermissionSet>) -> bool {
        self.publish(self.stage_permissions(permissions))
    }

    /// Clear credential, identity and permissions together.
    pub fn clear(&self) {
        self.publish(self.stage_clear());
    }

    /// [`Self::set_credential`] without notifying.
    pub fn stage_credential(&self, credential: Option<Credential>) -> StagedChange {
        self.mutate(|session| {
            if credential.is_none() {
                session.identity = None;
                session.permissions = None;
            }
            session.credential = credential;
            true
        })
    }

    /// [`Self::set_identity`] without notifying.
    pub fn stage_identity(&self, identity: Option<Identity>) -> StagedChange {
        self.mutate(|session| {
            if session.credential.is_none() && identity.is_some() {
                return false;
            }
            session.identity = identity;
            true
        })
    }

    /// [`Self::set_permissions`] without notifying.
    pub fn stage_permissions(&self, permissions: Option<PermissionSet>) -> StagedChange {
        self.mutate(|session| {
            if session.credential.is_none() && permissions.is_some() {
                return false;
            }
            session.permissions = permissions;
            true
        })
    }

    /// [`Self::clear`] without notifying.
    pub fn stage_clear(&self) -> StagedChange {
        self.mutate(|session| {
            *session = Session::default();
            true
        })
    }

    /// Notify observers of a staged change. Returns whether it was accepted.
    pub fn publish(&self, change: StagedChange) -> bool {
        if let Some(snapshot) = &change.snapshot {
            self.notify(snapshot);
        }
        change.accepted
    }

    /// Register a synchronous observer.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Get a receiver for live snapshots.
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<Session> {
        self.sender.subscribe()
    }

    /// Stream of snapshots, one per change, starting after subscription.
    #[must_use]
    pub fn changes(&self) -> futures::stream::BoxStream<'static, Session> {
        BroadcastStream::new(self.receiver())
            .filter_map(|res| async move { res.ok() })
            .boxed()
    }

    /// Apply `f` under the write lock; keep the snapshot if it changed anything.
    fn mutate<F>(&self, f: F) -> StagedChange
    where
        F: FnOnce(&mut Session) -> bool,
    {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        let before = session.clone();
        if !f(&mut session) {
            return StagedChange::default();
        }
        StagedChange {
            accepted: true,
            snapshot: (*session != before).then(|| session.clone()),
        }
    }

    fn notify(&self, snapshot: &Session) {
        let _ = self.sender.send(snapshot.clone()); // live listeners

        // Clone the list so observers may (un)subscribe while being called.
        let observers: Vec<Observer> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        tracing::trace!(
            authenticated = snapshot.is_authenticated(),
            observers = observers.len(),
            "Session changed"
        );
        for observer in observers {
            observer(snapshot);
        }
    }
}
