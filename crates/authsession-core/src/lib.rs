//! Core abstractions for client-side session bootstrap.
//!
//! This crate provides the fundamental building blocks:
//! - `Credential`, `Identity`, `PermissionSet`, `Session` - the data model
//! - `SessionState` - observable, single source of truth for the session
//! - Lookup and storage traits implemented by collaborators

pub mod model;
pub mod state;
pub mod traits;

pub use model::{Credential, Identity, PermissionSet, Session};
pub use state::{Observer, SessionReader, SessionState, StagedChange, SubscriptionId};
pub use traits::{BackendError, FetchError, IdentityFetcher, KeyValueBackend, PermissionsFetcher};
