//! TTL-bounded result cache.
//!
//! Expired entries are never served. A `get` on an expired entry counts as
//! a miss and leaves the entry in place; `sweep_expired` removes it.

use super::key::CacheKey;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use scamguard_core::{normalize_domain, AnalysisResult, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// One cached verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub result: AnalysisResult,
    /// URL or domain of the request that produced the result.
    pub target: String,
    pub cached_at: Timestamp,
    pub expires_at: Timestamp,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently held, expired or not.
    pub size: u64,
    /// `hits / (hits + misses)`, 0.0 before any lookup.
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn new(hits: u64, misses: u64, size: u64) -> Self {
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        Self {
            hits,
            misses,
            size,
            hit_rate,
        }
    }
}

/// Concurrent map of cache key to verdict with hit/miss accounting.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: DashMap<CacheKey, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entry for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheEntry> {
        match self.peek_at(key, now) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache_key = %key, "Cache hit");
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache_key = %key, "Cache miss");
                None
            }
        }
    }

    /// Live entry for `key` without touching the hit/miss counters.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.peek_at(key, Utc::now())
    }

    pub fn peek_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value().clone())
    }

    /// Insert or replace the entry for `key`.
    pub fn put(&self, key: CacheKey, target: impl Into<String>, result: AnalysisResult, ttl: Duration) {
        self.put_at(key, target, result, ttl, Utc::now());
    }

    pub fn put_at(
        &self,
        key: CacheKey,
        target: impl Into<String>,
        result: AnalysisResult,
        ttl: Duration,
        now: DateTime<Utc>,
    ) {
        let entry = CacheEntry {
            result,
            target: target.into(),
            cached_at: now,
            expires_at: expiry(now, ttl),
        };
        self.entries.insert(key, entry);
    }

    /// Insert an entry as-is, keeping its timestamps, unless the entry
    /// already held for `key` was cached at the same time or later.
    pub(crate) fn insert_if_newer(&self, key: CacheKey, entry: CacheEntry) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut held) => {
                if held.get().cached_at >= entry.cached_at {
                    return false;
                }
                held.insert(entry);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Remove every entry whose expiry is at or before now.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let removed = self.remove_where(|_, entry| entry.is_expired_at(now));
        if removed > 0 {
            info!(removed, remaining = self.entries.len(), "Swept expired cache entries");
        }
        removed
    }

    /// Remove every entry for a domain (normalized before matching).
    pub fn evict_domain(&self, domain: &str) -> usize {
        let domain = normalize_domain(domain);
        let removed = self.remove_where(|key, _| key.domain() == domain);
        info!(domain = %domain, removed, "Evicted cache entries for domain");
        removed
    }

    pub fn evict_all(&self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        info!(removed, "Cleared result cache");
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats::new(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.entries.len() as u64,
        )
    }

    /// Clone of every entry that is still live at `now`.
    pub fn live_entries_at(&self, now: DateTime<Utc>) -> Vec<(CacheKey, CacheEntry)> {
        self.entries
            .iter()
            .filter(|item| !item.value().is_expired_at(now))
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect()
    }

    fn remove_where(&self, predicate: impl Fn(&CacheKey, &CacheEntry) -> bool) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, entry| {
            if predicate(key, entry) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}

/// `now + ttl`, saturating at the latest representable instant.
fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scamguard_core::RiskLevel;

    const HOUR: Duration = Duration::from_secs(3600);

    fn result(risk: RiskLevel) -> AnalysisResult {
        AnalysisResult::new(risk, "verdict", 0.8)
    }

    fn key(domain: &str, content: &str) -> CacheKey {
        CacheKey::new(domain, content)
    }

    #[test]
    fn test_put_then_get_returns_value() {
        let cache = ResultCache::new();
        let k = key("example.com", "hello");
        let r = result(RiskLevel::High);
        cache.put(k.clone(), "https://example.com", r.clone(), HOUR);

        let entry = cache.get(&k).unwrap();
        assert_eq!(entry.result, r);
        assert_eq!(entry.target, "https://example.com");
    }

    #[test]
    fn test_get_twice_is_idempotent() {
        let cache = ResultCache::new();
        let k = key("example.com", "hello");
        cache.put(k.clone(), "t", result(RiskLevel::Low), HOUR);
        assert_eq!(cache.get(&k), cache.get(&k));

        let missing = key("other.com", "x");
        assert_eq!(cache.get(&missing), None);
        assert_eq!(cache.get(&missing), None);
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let cache = ResultCache::new();
        let k = key("example.com", "hello");
        cache.put(k.clone(), "t", result(RiskLevel::Low), Duration::ZERO);
        assert_eq!(cache.get(&k), None);
        // lazy policy: still held until swept
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expiry_boundary() {
        let cache = ResultCache::new();
        let k = key("example.com", "hello");
        let t0 = Utc::now();
        cache.put_at(k.clone(), "t", result(RiskLevel::Low), HOUR, t0);

        let just_before = t0 + chrono::Duration::seconds(3599);
        let at_expiry = t0 + chrono::Duration::seconds(3600);
        assert!(cache.get_at(&k, just_before).is_some());
        assert!(cache.get_at(&k, at_expiry).is_none());
    }

    #[test]
    fn test_peek_skips_counters_and_expired() {
        let cache = ResultCache::new();
        let live = key("example.com", "hello");
        let stale = key("stale.com", "x");
        cache.put(live.clone(), "t", result(RiskLevel::Medium), HOUR);
        cache.put(stale.clone(), "t", result(RiskLevel::Low), Duration::ZERO);

        assert!(cache.peek(&live).is_some());
        assert!(cache.peek(&stale).is_none());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 0));
    }

    #[test]
    fn test_put_overwrites() {
        let cache = ResultCache::new();
        let k = key("example.com", "hello");
        cache.put(k.clone(), "t", result(RiskLevel::Low), HOUR);
        cache.put(k.clone(), "t", result(RiskLevel::Critical), HOUR);
        assert_eq!(cache.get(&k).unwrap().result.risk_level, RiskLevel::Critical);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let cache = ResultCache::new();
        assert_eq!(cache.stats().hit_rate, 0.0);

        let k = key("example.com", "hello");
        cache.put(k.clone(), "t", result(RiskLevel::Low), HOUR);
        cache.get(&k);
        cache.get(&k);
        cache.get(&k);
        cache.get(&key("miss.com", ""));

        let stats = cache.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert!((stats.hit_rate - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let cache = ResultCache::new();
        let t0 = Utc::now();
        cache.put_at(key("a.com", "1"), "t", result(RiskLevel::Low), Duration::from_secs(10), t0);
        cache.put_at(key("b.com", "2"), "t", result(RiskLevel::Low), HOUR, t0);
        cache.put_at(key("c.com", "3"), "t", result(RiskLevel::Low), Duration::ZERO, t0);

        let removed = cache.sweep_expired_at(t0 + chrono::Duration::seconds(10));
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_at(&key("b.com", "2"), t0).is_some());
    }

    #[test]
    fn test_evict_domain_normalizes() {
        let cache = ResultCache::new();
        cache.put(key("example.com", "1"), "t", result(RiskLevel::Low), HOUR);
        cache.put(key("www.example.com", "2"), "t", result(RiskLevel::Low), HOUR);
        cache.put(key("other.com", "3"), "t", result(RiskLevel::Low), HOUR);

        assert_eq!(cache.evict_domain("WWW.EXAMPLE.COM"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.evict_all(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let cache = ResultCache::new();
        let k = key("example.com", "x");
        cache.put(k.clone(), "t", result(RiskLevel::Low), Duration::MAX);
        assert!(cache.get(&k).is_some());
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
