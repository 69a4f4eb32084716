//! Durable credential storage.
//!
//! Provides:
//! - `SessionStore` - get/set/remove of the persisted credential
//! - Backend implementations (memory, file)
//! - `StoreConfig` - storage key and location

pub mod backend;
pub mod config;
pub mod store;

pub use config::StoreConfig;
pub use store::SessionStore;
