//! scamguard Storage - Result Cache and Persistent State
//!
//! Holds the TTL-bounded verdict cache, the key-value capability the host
//! provides for persistence, and the history/feedback lists kept there.

pub mod cache;
pub mod history;
pub mod kv;
pub mod settings;

pub use cache::{
    content_hash, generate_cache_key, CacheEntry, CacheKey, CacheStats, ResultCache,
    HASHED_PREFIX_CHARS,
};
pub use history::{
    FeedbackRecord, HistoryEntry, HistoryLog, MAX_FEEDBACK_ENTRIES, MAX_HISTORY_ENTRIES,
};
pub use kv::{load_json, store_json, KeyValueStore, MemoryKeyValueStore, StorageScope};
pub use settings::{load_provider_settings, save_provider_settings};
