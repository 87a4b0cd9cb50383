//! Provider settings in the synced scope.

use crate::kv::{KeyValueStore, StorageScope, KEY_API_ENDPOINT, KEY_API_KEY, KEY_MODEL};
use scamguard_core::{ProviderConfig, StorageError};
use serde_json::Value;

/// Load endpoint, key and model from the synced scope.
///
/// Returns `None` when any of the three is missing or empty. The other
/// provider fields keep their defaults.
pub async fn load_provider_settings(
    store: &dyn KeyValueStore,
) -> Result<Option<ProviderConfig>, StorageError> {
    let endpoint = read_string(store, KEY_API_ENDPOINT).await?;
    let api_key = read_string(store, KEY_API_KEY).await?;
    let model = read_string(store, KEY_MODEL).await?;

    Ok(match (endpoint, api_key, model) {
        (Some(endpoint), Some(api_key), Some(model)) => {
            Some(ProviderConfig::new(endpoint, api_key, model))
        }
        _ => None,
    })
}

/// Write endpoint, key and model to the synced scope.
pub async fn save_provider_settings(
    store: &dyn KeyValueStore,
    config: &ProviderConfig,
) -> Result<(), StorageError> {
    store
        .set(StorageScope::Sync, KEY_API_ENDPOINT, Value::from(config.api_endpoint.as_str()))
        .await?;
    store
        .set(StorageScope::Sync, KEY_API_KEY, Value::from(config.api_key.as_str()))
        .await?;
    store
        .set(StorageScope::Sync, KEY_MODEL, Value::from(config.model.as_str()))
        .await
}

async fn read_string(store: &dyn KeyValueStore, key: &str) -> Result<Option<String>, StorageError> {
    Ok(store
        .get(StorageScope::Sync, key)
        .await?
        .and_then(|value| value.as_str().map(str::trim).map(str::to_string))
        .filter(|value| !value.is_empty()))
}
