//! Collaborator traits: identity/permission lookups and durable storage.

use async_trait::async_trait;
use thiserror::Error;

use crate::{Identity, PermissionSet};

/// Failure of an identity or permissions lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The backend rejected the credential.
    #[error("Unauthorized")]
    Unauthorized,
    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),
    /// The response body could not be decoded.
    #[error("Malformed response: {0}")]
    Malformed(String),
    /// Any other non-success HTTP status.
    #[error("Unexpected status: {0}")]
    Status(u16),
}

/// Looks up the profile belonging to a bearer token.
///
/// `Ok(None)` is an empty response, which is not a failure.
#[async_trait]
pub trait IdentityFetcher: Send + Sync {
    async fn fetch_identity(&self, token: &str) -> Result<Option<Identity>, FetchError>;
}

/// Looks up the grants of the current session.
///
/// Takes no arguments: implementations resolve the session context themselves.
#[async_trait]
pub trait PermissionsFetcher: Send + Sync {
    async fn fetch_permissions(&self) -> Result<Option<PermissionSet>, FetchError>;
}

/// Backend storage error.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The underlying medium failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Anything else, e.g. an invalid key.
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Synchronous key-value persistence medium.
pub trait KeyValueBackend: Send + Sync {
    /// Read the bytes stored under `key`, `None` if nothing is stored.
    ///
    /// # Errors
    /// Returns error if the medium cannot be read.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Overwrite the value under `key`.
    ///
    /// # Errors
    /// Returns error if the medium cannot be written.
    fn write(&self, key: &str, value: &[u8]) -> Result<(), BackendError>;

    /// Delete the value under `key`; deleting a missing key is not an error.
    ///
    /// # Errors
    /// Returns error if the medium cannot be written.
    fn delete(&self, key: &str) -> Result<(), BackendError>;
}
