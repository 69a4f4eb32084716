//! Scripted collaborators for bootstrap tests.

#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use authsession_bootstrap::SessionFacade;
use authsession_core::{
    Credential, FetchError, Identity, IdentityFetcher, KeyValueBackend, PermissionSet,
    PermissionsFetcher,
};
use authsession_store::{SessionStore, backend::MemoryBackend};
use tokio::sync::oneshot;

pub const STORAGE_KEY: &str = "auth";

pub type Reply<T> = Result<Option<T>, FetchError>;

/// Fetcher answering a single call with a reply supplied by the test.
pub struct Scripted<T> {
    reply: Mutex<Option<oneshot::Receiver<Reply<T>>>>,
    calls: AtomicUsize,
    tokens: Mutex<Vec<String>>,
}

impl<T: Send + 'static> Scripted<T> {
    /// Fetcher that blocks until the returned sender is used.
    pub fn pending() -> (Arc<Self>, oneshot::Sender<Reply<T>>) {
        let (tx, rx) = oneshot::channel();
        let fetcher = Arc::new(Self {
            reply: Mutex::new(Some(rx)),
            calls: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        });
        (fetcher, tx)
    }

    /// Fetcher that answers immediately.
    pub fn ready(reply: Reply<T>) -> Arc<Self> {
        let (fetcher, tx) = Self::pending();
        let _ = tx.send(reply);
        fetcher
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    async fn next_reply(&self) -> Reply<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rx = self.reply.lock().unwrap().take();
        match rx {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(FetchError::Network("reply dropped".to_string()))),
            None => Err(FetchError::Network("called more than once".to_string())),
        }
    }
}

#[async_trait]
impl IdentityFetcher for Scripted<Identity> {
    async fn fetch_identity(&self, token: &str) -> Reply<Identity> {
        self.tokens.lock().unwrap().push(token.to_string());
        self.next_reply().await
    }
}

#[async_trait]
impl PermissionsFetcher for Scripted<PermissionSet> {
    async fn fetch_permissions(&self) -> Reply<PermissionSet> {
        self.next_reply().await
    }
}

/// Identity fetcher that panics mid-lookup.
pub struct PanickingIdentity;

#[async_trait]
impl IdentityFetcher for PanickingIdentity {
    async fn fetch_identity(&self, _token: &str) -> Reply<Identity> {
        panic!("identity backend exploded");
    }
}

pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub store: SessionStore,
    pub facade: SessionFacade,
}

impl Harness {
    pub fn new(
        stored: Option<&str>,
        identity: Arc<dyn IdentityFetcher>,
        permissions: Arc<dyn PermissionsFetcher>,
    ) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let store = SessionStore::new(backend.clone(), STORAGE_KEY);
        if let Some(token) = stored {
            store.set(&Credential::new(token));
        }
        let facade = SessionFacade::new(store.clone(), identity, permissions);
        Self {
            backend,
            store,
            facade,
        }
    }

    pub fn stored_token(&self) -> Option<String> {
        self.store.get().map(|c| c.token().to_string())
    }

    pub fn has_stored_entry(&self) -> bool {
        self.backend.read(STORAGE_KEY).unwrap().is_some()
    }
}

pub fn profile(id: &str) -> Identity {
    Identity::new(id).with_display_name(format!("User {id}"))
}

pub fn grants(names: &[&str]) -> PermissionSet {
    PermissionSet::new(names.iter().copied())
}

pub fn token_of(session: &authsession_core::Session) -> Option<&str> {
    session.credential().map(Credential::token)
}
