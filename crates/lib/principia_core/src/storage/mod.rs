//! Key-value persistence for session state.
//!
//! Backends implement [`StorageBackend`] over raw strings. [`SessionStore`]
//! adds a key namespace and JSON serialization on top, and swallows backend
//! failures: persistence is best-effort, in-memory state is authoritative.

pub mod file;
pub mod memory;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Backend storage errors. Never escape a [`SessionStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Raw string key-value store.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently held, in any order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Namespaced, JSON-serializing view over a shared backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
    namespace: String,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn StorageBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// Store backed by a fresh [`MemoryBackend`].
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), namespace)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.namespace)
    }

    /// Serialize and write `value` under `key`. Failures are logged only.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        let full_key = self.full_key(key);
        let result = serde_json::to_string(value)
            .map_err(StorageError::from)
            .and_then(|json| self.backend.write(&full_key, &json));
        if let Err(e) = result {
            warn!(key = %full_key, error = %e, "failed to persist value");
        }
    }

    /// Read and deserialize `key`. Missing, unreadable or malformed data is `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.full_key(key);
        let raw = match self.backend.read(&full_key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %full_key, error = %e, "failed to read value");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %full_key, error = %e, "discarding malformed value");
                None
            }
        }
    }

    pub fn remove(&self, key: &str) {
        let full_key = self.full_key(key);
        if let Err(e) = self.backend.delete(&full_key) {
            warn!(key = %full_key, error = %e, "failed to remove value");
        }
    }

    /// Remove every key under this store's namespace, and nothing else.
    pub fn clear(&self) {
        let keys = match self.backend.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "failed to list keys");
                return;
            }
        };
        for key in keys.iter().filter(|k| k.starts_with(&self.namespace)) {
            if let Err(e) = self.backend.delete(key) {
                warn!(key = %key, error = %e, "failed to remove value");
            }
        }
    }
}

/// Backend that fails every operation.
#[cfg(test)]
pub(crate) struct BrokenBackend;

#[cfg(test)]
impl StorageBackend for BrokenBackend {
    fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Backend("quota exceeded".into()))
    }
    fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Backend("quota exceeded".into()))
    }
    fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Backend("quota exceeded".into()))
    }
    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Err(StorageError::Backend("quota exceeded".into()))
    }
}
