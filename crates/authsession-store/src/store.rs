//! Durable credential store.

use std::sync::Arc;

use authsession_core::{Credential, KeyValueBackend};

/// Persists the raw credential under a single key.
///
/// Never fails from the caller's point of view: unreadable or malformed
/// entries read as absent, and write errors are logged and dropped.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueBackend>,
    key: String,
}

impl SessionStore {
    /// Create a store over `backend` using `key`.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the stored credential.
    #[must_use]
    pub fn get(&self) -> Option<Credential> {
        let bytes = match self.backend.read(&self.key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, "Failed to read stored credential: {e}");
                return None;
            }
        };

        match serde_json::from_slice::<Credential>(&bytes) {
            Ok(credential) if credential.is_usable() => Some(credential),
            Ok(_) => {
                tracing::debug!(key = %self.key, "Stored credential has an empty token");
                None
            }
            Err(e) => {
                tracing::warn!(key = %self.key, "Ignoring malformed stored credential: {e}");
                None
            }
        }
    }

    /// Overwrite the stored credential.
    pub fn set(&self, credential: &Credential) {
        let bytes = match serde_json::to_vec(credential) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to serialize credential: {e}");
                return;
            }
        };
        if let Err(e) = self.backend.write(&self.key, &bytes) {
            tracing::warn!(key = %self.key, "Failed to persist credential: {e}");
        }
    }

    /// Remove the stored credential. Removing twice is a no-op.
    pub fn remove(&self) {
        if let Err(e) = self.backend.delete(&self.key) {
            tracing::warn!(key = %self.key, "Failed to remove stored credential: {e}");
        }
    }
}
