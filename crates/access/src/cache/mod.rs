//! In-memory TTL cache.
//!
//! A policy-free key/value store: every entry carries its own TTL chosen by
//! the caller. Expiry is checked lazily on read; a background sweeper and a
//! capacity bound keep unread expired entries from piling up.

mod sweeper;

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

pub use sweeper::{MIN_SWEEP_INTERVAL, SweeperHandle};

/// Default maximum number of resident entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Longest TTL honoured; larger values are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Build a cache key from a namespace and ordered parameters.
///
/// The same logical resource always maps to the same key. Parts are joined
/// with `:`; a `:` or `%` inside a part is percent-encoded, so distinct
/// part lists never share a key and `namespace:part:` prefixes stay exact.
pub fn cache_key(namespace: &str, parts: &[&str]) -> String {
    let mut key = String::from(namespace);
    for part in parts {
        key.push(':');
        for c in part.chars() {
            match c {
                '%' => key.push_str("%25"),
                ':' => key.push_str("%3A"),
                c => key.push(c),
            }
        }
    }
    key
}

/// One cached value and its absolute expiry.
struct CacheItem {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

impl CacheItem {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// TTL cache shared by everything constructed from it.
///
/// Wrapped in Arc internally so Clone is cheap; clones see the same entries.
#[derive(Clone)]
pub struct TtlCache {
    inner: Arc<TtlCacheInner>,
}

struct TtlCacheInner {
    entries: DashMap<String, CacheItem>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
}

impl TtlCache {
    /// Create a cache holding at most `max_entries` entries (minimum 1).
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(TtlCacheInner {
                entries: DashMap::new(),
                max_entries: max_entries.max(1),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                expirations: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    /// Get a value.
    ///
    /// Returns `None` if the key was never set, has expired, or holds a
    /// value of another type. An expired entry is removed on the way out.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();

        let expired = match self.inner.entries.get(key) {
            Some(item) if !item.is_expired(now) => {
                if let Some(value) = item.value.downcast_ref::<T>() {
                    self.inner.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "cache hit");
                    return Some(value.clone());
                }
                false
            }
            Some(_) => true,
            None => false,
        };

        if expired
            && self
                .inner
                .entries
                .remove_if(key, |_, item| item.is_expired(now))
                .is_some()
        {
            self.inner.expirations.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "cache entry expired");
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value for `ttl` (at most [`MAX_TTL`]). Overwrites any
    /// existing entry.
    pub fn set<T>(&self, key: impl Into<String>, value: T, ttl: Duration)
    where
        T: Send + Sync + 'static,
    {
        let key = key.into();
        let ttl = ttl.min(MAX_TTL);

        if !self.inner.entries.contains_key(&key)
            && self.inner.entries.len() >= self.inner.max_entries
        {
            self.make_room();
        }

        debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache set");
        self.inner.entries.insert(
            key,
            CacheItem {
                value: Arc::new(value),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove a key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.entries.remove(key).is_some()
    }

    /// Remove every key starting with `prefix`. Returns the number removed.
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let before = self.inner.entries.len();
        self.inner.entries.retain(|k, _| !k.starts_with(prefix));
        let removed = before.saturating_sub(self.inner.entries.len());
        debug!(prefix = %prefix, removed, "cache prefix invalidated");
        removed
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, item| !item.is_expired(now));
        let removed = before.saturating_sub(self.inner.entries.len());
        if removed > 0 {
            self.inner
                .expirations
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Number of resident entries, expired-but-unread ones included.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Get cache statistics (for monitoring).
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            expirations: self.inner.expirations.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            entries: self.inner.entries.len(),
            max_entries: self.inner.max_entries,
        }
    }

    /// Run [`purge_expired`](Self::purge_expired) every `interval` on a
    /// background task until the returned handle is stopped or dropped.
    /// Intervals below [`MIN_SWEEP_INTERVAL`] are raised to it.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        SweeperHandle::spawn(self.clone(), interval)
    }

    /// Free one slot: purge expired entries, then evict the entry closest
    /// to expiry if that was not enough.
    fn make_room(&self) {
        if self.purge_expired() > 0 && self.inner.entries.len() < self.inner.max_entries {
            return;
        }

        let victim = self
            .inner
            .entries
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim
            && self.inner.entries.remove(&key).is_some()
        {
            self.inner.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "cache entry evicted at capacity");
        }
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.inner.entries.len())
            .field("max_entries", &self.inner.max_entries)
            .finish()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because their TTL ran out.
    pub expirations: u64,
    /// Live entries dropped to stay under `max_entries`.
    pub evictions: u64,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Fraction of reads served from cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_joins_in_order() {
        assert_eq!(cache_key("role", &["f1", "u1"]), "role:f1:u1");
        assert_eq!(cache_key("role", &["u1", "f1"]), "role:u1:f1");
        assert_eq!(cache_key("members", &[]), "members");
    }

    #[test]
    fn test_cache_key_escapes_separator() {
        assert_ne!(cache_key("role", &["a:b", "c"]), cache_key("role", &["a", "b:c"]));
        assert_eq!(cache_key("role", &["a:b", "c"]), "role:a%3Ab:c");
        assert_ne!(cache_key("role", &["a%3Ab"]), cache_key("role", &["a:b"]));

        // A facility prefix does not reach into a longer id.
        let prefix = format!("{}:", cache_key("role", &["a"]));
        assert!(!cache_key("role", &["a:b", "c"]).starts_with(&prefix));
        assert!(cache_key("role", &["a", "b:c"]).starts_with(&prefix));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_is_clamped() {
        let cache = TtlCache::default();
        cache.set("k", 1u8, Duration::from_secs(u64::MAX));
        cache.set("m", 2u8, Duration::MAX);

        tokio::time::advance(Duration::from_secs(365 * 24 * 60 * 60)).await;
        assert_eq!(cache.get::<u8>("k"), Some(1));
        assert_eq!(cache.get::<u8>("m"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_after_set() {
        let cache = TtlCache::default();
        cache.set("k", 42u32, Duration::from_secs(5));
        assert_eq!(cache.get::<u32>("k"), Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_ttl() {
        let cache = TtlCache::default();
        cache.set("k", "v".to_string(), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get::<String>("k").as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get::<String>("k"), None);
        // Lazily removed by the read.
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_and_expired_look_the_same() {
        let cache = TtlCache::default();
        cache.set("old", 1u8, Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(cache.get::<u8>("old"), cache.get::<u8>("never"));
    }

    #[test]
    fn test_wrong_type_is_a_miss() {
        let cache = TtlCache::default();
        cache.set("k", 1u64, Duration::from_secs(60));
        assert_eq!(cache.get::<String>("k"), None);
        assert_eq!(cache.get::<u64>("k"), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = TtlCache::default();
        cache.set("a", 1u8, Duration::from_secs(60));
        cache.set("b", 2u8, Duration::from_secs(60));

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.get::<u8>("a"), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_delete_prefix() {
        let cache = TtlCache::default();
        cache.set("role:f1:u1", 1u8, Duration::from_secs(60));
        cache.set("role:f1:u2", 2u8, Duration::from_secs(60));
        cache.set("role:f2:u1", 3u8, Duration::from_secs(60));

        assert_eq!(cache.delete_prefix("role:f1:"), 2);
        assert_eq!(cache.get::<u8>("role:f2:u1"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_keeps_live_entries() {
        let cache = TtlCache::default();
        cache.set("short", 1u8, Duration::from_secs(1));
        cache.set("long", 2u8, Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get::<u8>("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_prefers_expired_entries() {
        let cache = TtlCache::new(2);
        cache.set("a", 1u8, Duration::from_secs(1));
        cache.set("b", 2u8, Duration::from_secs(100));
        tokio::time::advance(Duration::from_secs(2)).await;

        cache.set("c", 3u8, Duration::from_secs(100));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get::<u8>("b"), Some(2));
        assert_eq!(cache.get::<u8>("c"), Some(3));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_capacity_evicts_closest_to_expiry() {
        let cache = TtlCache::new(2);
        cache.set("soon", 1u8, Duration::from_secs(10));
        cache.set("later", 2u8, Duration::from_secs(100));
        cache.set("new", 3u8, Duration::from_secs(50));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get::<u8>("soon"), None);
        assert_eq!(cache.get::<u8>("later"), Some(2));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let cache = TtlCache::new(1);
        cache.set("k", 1u8, Duration::from_secs(10));
        cache.set("k", 2u8, Duration::from_secs(10));
        assert_eq!(cache.get::<u8>("k"), Some(2));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_stats_hit_rate() {
        let cache = TtlCache::default();
        assert_eq!(cache.stats().hit_rate(), 0.0);

        cache.set("k", 1u8, Duration::from_secs(10));
        cache.get::<u8>("k");
        cache.get::<u8>("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = TtlCache::default();
        let other = cache.clone();
        cache.set("k", 7u8, Duration::from_secs(10));
        assert_eq!(other.get::<u8>("k"), Some(7));
    }
}
