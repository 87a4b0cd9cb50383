//! Persistent key-value capability.
//!
//! The host environment provides two scopes: a small synced one for
//! settings and a larger local one for cache snapshots and history. Values
//! are JSON. There are no transactions across keys.

use async_trait::async_trait;
use scamguard_core::StorageError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Synced-scope key for the endpoint URL.
pub const KEY_API_ENDPOINT: &str = "apiEndpoint";
/// Synced-scope key for the API key.
pub const KEY_API_KEY: &str = "apiKey";
/// Synced-scope key for the model name.
pub const KEY_MODEL: &str = "model";
/// Local-scope key for the cache snapshot.
pub const KEY_ANALYSIS_CACHE: &str = "analysisCache";
/// Local-scope key for the analysis history.
pub const KEY_ANALYSIS_HISTORY: &str = "analysisHistory";
/// Local-scope key for user feedback.
pub const KEY_USER_FEEDBACK: &str = "userFeedback";

/// Which storage area a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// Small, synced across the user's devices.
    Sync,
    /// Larger, this device only.
    Local,
}

/// Async get/set capability over JSON values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, scope: StorageScope, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, scope: StorageScope, key: &str, value: Value) -> Result<(), StorageError>;

    async fn remove(&self, scope: StorageScope, key: &str) -> Result<(), StorageError>;
}

/// Read and deserialize a value.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    scope: StorageScope,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(scope, key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StorageError::Serialization {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Serialize and write a value.
pub async fn store_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    scope: StorageScope,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let value = serde_json::to_value(value).map_err(|e| StorageError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.set(scope, key, value).await
}

// ============================================================================
// IN-MEMORY IMPLEMENTATION
// ============================================================================

/// In-memory store, used in tests and as a stand-in when the host has no
/// persistent storage.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<(StorageScope, String), Value>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held in a scope.
    pub fn len(&self, scope: StorageScope) -> usize {
        self.values
            .read()
            .map(|values| values.keys().filter(|(s, _)| *s == scope).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().map(|values| values.is_empty()).unwrap_or(true)
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, scope: StorageScope, key: &str) -> Result<Option<Value>, StorageError> {
        let values = self.values.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(values.get(&(scope, key.to_string())).cloned())
    }

    async fn set(&self, scope: StorageScope, key: &str, value: Value) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|_| StorageError::LockPoisoned)?;
        values.insert((scope, key.to_string()), value);
        Ok(())
    }

    async fn remove(&self, scope: StorageScope, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|_| StorageError::LockPoisoned)?;
        values.remove(&(scope, key.to_string()));
        Ok(())
    }
}
