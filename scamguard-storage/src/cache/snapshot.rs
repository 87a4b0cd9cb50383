//! Cache snapshot persistence to the local key-value scope.

use super::key::CacheKey;
use super::store::{CacheEntry, ResultCache};
use crate::kv::{load_json, store_json, KeyValueStore, StorageScope, KEY_ANALYSIS_CACHE};
use chrono::{DateTime, Utc};
use scamguard_core::StorageError;
use std::collections::BTreeMap;
use tracing::{info, warn};

impl ResultCache {
    /// Write all live entries to the local scope. Returns how many.
    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<usize, StorageError> {
        self.persist_at(store, Utc::now()).await
    }

    pub async fn persist_at(
        &self,
        store: &dyn KeyValueStore,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let snapshot: BTreeMap<String, CacheEntry> = self
            .live_entries_at(now)
            .into_iter()
            .map(|(key, entry)| (key.to_string(), entry))
            .collect();
        store_json(store, StorageScope::Local, KEY_ANALYSIS_CACHE, &snapshot).await?;
        info!(entries = snapshot.len(), "Persisted cache snapshot");
        Ok(snapshot.len())
    }

    /// Load a snapshot written by [`ResultCache::persist`], skipping expired
    /// entries and malformed keys. A held entry cached at the same time or
    /// later than the snapshot's wins. Hit and miss counters are untouched.
    pub async fn restore(&self, store: &dyn KeyValueStore) -> Result<usize, StorageError> {
        self.restore_at(store, Utc::now()).await
    }

    pub async fn restore_at(
        &self,
        store: &dyn KeyValueStore,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let Some(snapshot) = load_json::<BTreeMap<String, CacheEntry>>(
            store,
            StorageScope::Local,
            KEY_ANALYSIS_CACHE,
        )
        .await?
        else {
            return Ok(0);
        };

        let mut restored = 0;
        for (raw_key, entry) in snapshot {
            let Some(key) = CacheKey::parse(&raw_key) else {
                warn!(cache_key = %raw_key, "Skipping malformed cache key in snapshot");
                continue;
            };
            if entry.is_expired_at(now) {
                continue;
            }
            if self.insert_if_newer(key, entry) {
                restored += 1;
            }
        }
        info!(restored, "Restored cache snapshot");
        Ok(restored)
    }
}
