//! Decision caching.
//!
//! Each compiled enforcer owns one cache, so cached decisions are dropped
//! together with the snapshot they were computed from.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use praetor_core::Decision;

/// Configuration for the decision cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Time-to-live for cached decisions.
    pub ttl: Duration,
    /// Whether to cache denials.
    pub cache_denies: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(300),
            cache_denies: false,
        }
    }
}

impl CacheConfig {
    /// Disable caching.
    pub fn disabled() -> Self {
        Self {
            max_entries: 0,
            ttl: Duration::ZERO,
            cache_denies: false,
        }
    }

    /// Whether caching is turned off.
    pub fn is_disabled(&self) -> bool {
        self.max_entries == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    subject: String,
    resource: String,
    action: String,
}

impl CacheKey {
    fn new(subject: &str, resource: &str, action: &str) -> Self {
        Self {
            subject: subject.to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    decision: Decision,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub size: usize,
    /// Number of evictions due to capacity or expiry.
    pub evictions: u64,
}

/// Cache of `(subject, resource, action)` decisions.
#[derive(Debug)]
pub struct DecisionCache {
    config: CacheConfig,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl DecisionCache {
    /// Create a new decision cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// The cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a cached decision.
    pub fn get(&self, subject: &str, resource: &str, action: &str) -> Option<Decision> {
        if self.config.is_disabled() {
            return None;
        }

        let key = CacheKey::new(subject, resource, action);
        let entries = self.entries.read();

        if let Some(entry) = entries.get(&key) {
            if !entry.is_expired(self.config.ttl) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.decision);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a decision if the configuration allows caching it.
    pub fn insert(&self, subject: &str, resource: &str, action: &str, decision: Decision) {
        if !self.should_cache(decision) {
            return;
        }

        let key = CacheKey::new(subject, resource, action);
        let entry = CacheEntry {
            decision,
            created_at: Instant::now(),
        };

        let mut entries = self.entries.write();

        if entries.len() >= self.config.max_entries {
            self.evict_expired(&mut entries);
        }

        while entries.len() >= self.config.max_entries {
            if let Some(oldest_key) = Self::find_oldest(&entries) {
                entries.remove(&oldest_key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            } else {
                break;
            }
        }

        entries.insert(key, entry);
    }

    /// Check if a decision should be cached.
    ///
    /// Only allows and denials are cacheable; an unauthenticated outcome
    /// never reaches the cache.
    pub fn should_cache(&self, decision: Decision) -> bool {
        if self.config.is_disabled() {
            return false;
        }
        match decision {
            Decision::Allowed => true,
            Decision::Denied => self.config.cache_denies,
            Decision::Unauthenticated => false,
        }
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.read().len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn evict_expired(&self, entries: &mut HashMap<CacheKey, CacheEntry>) {
        let ttl = self.config.ttl;
        let before = entries.len();
        entries.retain(|_, v| !v.is_expired(ttl));
        let evicted = before - entries.len();
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
    }

    fn find_oldest(entries: &HashMap<CacheKey, CacheEntry>) -> Option<CacheKey> {
        entries
            .iter()
            .min_by_key(|(_, v)| v.created_at)
            .map(|(k, _)| k.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_miss() {
        let cache = DecisionCache::new(CacheConfig::default());

        assert!(cache.get("alice", "document", "update").is_none());

        cache.insert("alice", "document", "update", Decision::Allowed);
        assert_eq!(
            cache.get("alice", "document", "update"),
            Some(Decision::Allowed)
        );
        assert!(cache.get("alice", "document", "delete").is_none());
    }

    #[test]
    fn test_cache_stats() {
        let cache = DecisionCache::new(CacheConfig::default());

        cache.get("alice", "document", "update");
        cache.insert("alice", "document", "update", Decision::Allowed);
        cache.get("alice", "document", "update");
        cache.get("alice", "document", "update");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_cache_disabled() {
        let cache = DecisionCache::new(CacheConfig::disabled());
        cache.insert("alice", "document", "update", Decision::Allowed);
        assert!(cache.get("alice", "document", "update").is_none());
    }

    #[test]
    fn test_should_cache_deny() {
        let no_deny = DecisionCache::new(CacheConfig::default());
        let with_deny = DecisionCache::new(CacheConfig {
            cache_denies: true,
            ..Default::default()
        });

        assert!(no_deny.should_cache(Decision::Allowed));
        assert!(!no_deny.should_cache(Decision::Denied));
        assert!(with_deny.should_cache(Decision::Denied));
        assert!(!with_deny.should_cache(Decision::Unauthenticated));
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = DecisionCache::new(CacheConfig {
            max_entries: 2,
            ..Default::default()
        });

        cache.insert("a", "r", "x", Decision::Allowed);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b", "r", "x", Decision::Allowed);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c", "r", "x", Decision::Allowed);

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.evictions, 1);
        assert!(cache.get("a", "r", "x").is_none());
        assert!(cache.get("c", "r", "x").is_some());
    }

    #[test]
    fn test_cache_clear() {
        let cache = DecisionCache::new(CacheConfig::default());
        cache.insert("alice", "document", "update", Decision::Allowed);
        cache.clear();
        assert!(cache.get("alice", "document", "update").is_none());
    }
}
