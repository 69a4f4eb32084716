//! Storage configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Environment variable overriding [`StoreConfig::key`].
pub const ENV_STORAGE_KEY: &str = "AUTHSESSION_STORAGE_KEY";
/// Environment variable overriding [`StoreConfig::dir`].
pub const ENV_STORAGE_DIR: &str = "AUTHSESSION_STORAGE_DIR";

const DEFAULT_KEY: &str = "auth-session";

/// Where and under which key the credential is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Key the credential is stored under.
    #[serde(default = "default_key")]
    pub key: String,

    /// Directory used by the file backend.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            dir: default_dir(),
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by `AUTHSESSION_STORAGE_KEY` / `AUTHSESSION_STORAGE_DIR`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(key) = lookup(ENV_STORAGE_KEY).filter(|k| !k.trim().is_empty()) {
            config.key = key;
        }
        if let Some(dir) = lookup(ENV_STORAGE_DIR).filter(|d| !d.trim().is_empty()) {
            config.dir = PathBuf::from(dir);
        }
        config
    }
}

fn default_key() -> String {
    DEFAULT_KEY.to_string()
}

fn default_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("authsession")
}
