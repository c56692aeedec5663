//! Session cache keyed by conversation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

/// Entry stored in the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cached value.
    pub value: V,

    /// When this entry was inserted into cache.
    pub cached_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Create a new cache entry.
    pub fn new(value: V) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
        }
    }
}

/// In-memory cache of values keyed by session.
///
/// Cloning is cheap; clones share the same map. Readers never block each
/// other. [`SessionCache::key_lock`] serializes work for a single key so a
/// miss is filled once, while other keys proceed independently.
pub struct SessionCache<V> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    key_locks: Arc<parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl<V: Clone + Send + Sync> SessionCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            key_locks: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    /// Get the current number of cached sessions.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Get the value cached for `key`.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        let value = entries.get(key).map(|e| e.value.clone());
        trace!(session = %key, hit = value.is_some(), "session cache lookup");
        value
    }

    /// Get the full entry cached for `key`.
    pub async fn get_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Check if a value is cached for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Insert a value, replacing any previous one for `key`.
    pub async fn insert(&self, key: &str, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), CacheEntry::new(value));
        debug!(
            session = %key,
            cache_size = entries.len(),
            "session inserted into cache"
        );
    }

    /// Remove and return the value cached for `key`.
    pub async fn remove(&self, key: &str) -> Option<V> {
        let removed = self.entries.write().await.remove(key);
        {
            let mut locks = self.key_locks.lock();
            if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(key);
            }
        }
        if removed.is_some() {
            debug!(session = %key, "session removed from cache");
        }
        removed.map(|e| e.value)
    }

    /// List cached session keys.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.read().await.len(),
            locked_keys: self.key_locks.lock().len(),
        }
    }

    /// The async mutex guarding fill work for `key`.
    ///
    /// Every call for the same key returns the same mutex while any caller
    /// still holds it. Mutexes nobody holds are dropped from the map here.
    pub fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock();
        locks.retain(|k, lock| k == key || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

impl<V: Clone + Send + Sync> Default for SessionCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for SessionCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            key_locks: Arc::clone(&self.key_locks),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Current number of cached sessions.
    pub size: usize,

    /// Number of keys that have handed out a fill lock.
    pub locked_keys: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = SessionCache::new();
        cache.insert("session-1", vec![1, 2, 3]).await;

        assert_eq!(cache.get("session-1").await, Some(vec![1, 2, 3]));
        assert_eq!(cache.len().await, 1);
        assert!(cache.contains("session-1").await);
    }

    #[tokio::test]
    async fn test_miss_is_none() {
        let cache: SessionCache<String> = SessionCache::new();
        assert!(cache.get("nonexistent").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_insert_replaces() {
        let cache = SessionCache::new();
        cache.insert("session-1", "old").await;
        cache.insert("session-1", "new").await;

        assert_eq!(cache.get("session-1").await, Some("new"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = SessionCache::new();
        cache.insert("session-1", 7u32).await;

        assert_eq!(cache.remove("session-1").await, Some(7));
        assert_eq!(cache.remove("session-1").await, None);
        assert!(!cache.contains("session-1").await);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = SessionCache::new();
        let other = cache.clone();
        cache.insert("session-1", 1u8).await;

        assert_eq!(other.get("session-1").await, Some(1));
        let mut keys = other.keys().await;
        keys.sort();
        assert_eq!(keys, vec!["session-1"]);
    }

    #[tokio::test]
    async fn test_get_entry_records_insert_time() {
        let cache = SessionCache::new();
        let before = Instant::now();
        cache.insert("session-1", ()).await;

        let entry = cache.get_entry("session-1").await.unwrap();
        assert!(entry.cached_at >= before);
    }

    #[tokio::test]
    async fn test_key_lock_is_shared_per_key() {
        let cache: SessionCache<u8> = SessionCache::new();
        let a = cache.key_lock("session-1");
        let b = cache.key_lock("session-1");
        let c = cache.key_lock("session-2");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.stats().await.locked_keys, 2);
    }

    #[tokio::test]
    async fn test_key_locks_do_not_accumulate() {
        let cache: SessionCache<u8> = SessionCache::new();
        for i in 0..100 {
            let key = format!("session-{i}");
            let lock = cache.key_lock(&key);
            let _guard = lock.lock().await;
            cache.insert(&key, 1).await;
        }
        assert_eq!(cache.stats().await.locked_keys, 1);

        let held = cache.key_lock("session-held");
        let _ = cache.key_lock("session-next");
        assert_eq!(cache.stats().await.locked_keys, 2);
        assert!(Arc::ptr_eq(&held, &cache.key_lock("session-held")));

        cache.remove("session-next").await;
        assert_eq!(cache.stats().await.locked_keys, 1);
        drop(held);
        cache.remove("session-held").await;
        assert_eq!(cache.stats().await.locked_keys, 0);
    }

    #[tokio::test]
    async fn test_key_lock_serializes_fill() {
        let cache: SessionCache<u32> = SessionCache::new();
        let fills = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let fills = Arc::clone(&fills);
            handles.push(tokio::spawn(async move {
                let lock = cache.key_lock("session-1");
                let _guard = lock.lock().await;
                if let Some(v) = cache.get("session-1").await {
                    return v;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
                fills.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                cache.insert("session-1", 42).await;
                42
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(fills.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_keys_not_blocked() {
        let cache: SessionCache<u8> = SessionCache::new();
        let lock = cache.key_lock("session-1");
        let _held = lock.lock().await;

        let other = cache.key_lock("session-2");
        let acquired = tokio::time::timeout(Duration::from_millis(100), other.lock()).await;
        assert!(acquired.is_ok());
    }
}
