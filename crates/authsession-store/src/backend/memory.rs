//! In-memory key-value backend.

use std::{collections::HashMap, sync::RwLock};

use authsession_core::{BackendError, KeyValueBackend};

/// In-memory backend.
///
/// Useful for tests and embedded use. Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .is_ok_and(|entries| entries.contains_key(key))
    }
}

impl KeyValueBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self
            .entries
            .read()
            .map_err(|e| BackendError::Internal(e.to_string()))?
            .get(key)
            .cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        self.entries
            .write()
            .map_err(|e| BackendError::Internal(e.to_string()))?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.entries
            .write()
            .map_err(|e| BackendError::Internal(e.to_string()))?
            .remove(key);
        Ok(())
    }
}
