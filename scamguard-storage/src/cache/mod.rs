//! Result cache keyed by normalized domain and content hash.

pub mod key;
pub mod snapshot;
pub mod store;

pub use key::{content_hash, generate_cache_key, CacheKey, HASHED_PREFIX_CHARS};
pub use store::{CacheEntry, CacheStats, ResultCache};
