//! Bounded memoizing cache for detector lookups.

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::future::Future;
use std::hash::Hash;

/// Size-bounded, least-recently-used cache with no time-based expiry.
///
/// Concurrent callers on different keys never block each other. Callers racing
/// on the same key may both compute; the last insert is kept for everyone.
pub struct LookupCache<K, V>
where
    K: Hash + Eq + Send + Sync + Clone + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
    name: String,
    max_capacity: u64,
}

impl<K, V> LookupCache<K, V>
where
    K: Hash + Eq + Send + Sync + Clone + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache holding at most `max_capacity` entries.
    pub fn new(name: impl Into<String>, max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            inner,
            name: name.into(),
            max_capacity,
        }
    }

    /// Get a value from the cache.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    /// Insert a value into the cache.
    pub async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    /// Return the cached value for `key`, or run `compute` and cache its result
    /// when `retain` accepts it.
    pub async fn get_or_compute<F, R>(&self, key: K, compute: F, retain: R) -> V
    where
        F: Future<Output = V>,
        R: FnOnce(&V) -> bool,
    {
        if let Some(hit) = self.inner.get(&key).await {
            return hit;
        }

        let value = compute.await;
        if retain(&value) {
            self.inner.insert(key, value.clone()).await;
        }
        value
    }

    /// Get the current entry count.
    ///
    /// Eviction is applied lazily; call [`Self::run_pending_tasks`] first for an exact figure.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Flush pending inserts and evictions.
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Get the configured capacity.
    pub fn max_capacity(&self) -> u64 {
        self.max_capacity
    }

    /// Get the cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invalidate all entries.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_cache_basic() {
        let cache: LookupCache<String, Option<bool>> = LookupCache::new("test", 100);

        cache.insert("10.0.0.1".to_string(), Some(true)).await;
        cache.insert("10.0.0.2".to_string(), None).await;

        assert_eq!(cache.get(&"10.0.0.1".to_string()).await, Some(Some(true)));
        // A memoized "unknown" is still a hit
        assert_eq!(cache.get(&"10.0.0.2".to_string()).await, Some(None));
        assert_eq!(cache.get(&"missing".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_get_or_compute_memoizes() {
        let cache: LookupCache<String, u32> = LookupCache::new("test", 100);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute(
                    "key".to_string(),
                    async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        7
                    },
                    |_| true,
                )
                .await;
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_skips_rejected_values() {
        let cache: LookupCache<String, Option<bool>> = LookupCache::new("test", 100);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .get_or_compute(
                    "key".to_string(),
                    async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        None
                    },
                    |v| v.is_some(),
                )
                .await;
            assert_eq!(value, None);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get(&"key".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_cache_capacity_bound() {
        let cache: LookupCache<u32, u32> = LookupCache::new("test", 4);

        for i in 0..32 {
            cache.insert(i, i).await;
        }
        cache.run_pending_tasks().await;

        assert!(cache.entry_count() <= cache.max_capacity());
        assert_eq!(cache.name(), "test");
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let cache: LookupCache<u32, u32> = LookupCache::new("test", 3);

        for i in 0..3 {
            cache.insert(i, i).await;
        }
        assert_eq!(cache.get(&0).await, Some(0));

        cache.insert(3, 3).await;
        cache.run_pending_tasks().await;

        assert_eq!(cache.get(&0).await, Some(0));
        assert_eq!(cache.get(&1).await, None);
        assert_eq!(cache.get(&3).await, Some(3));
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache: LookupCache<u32, u32> = LookupCache::new("test", 10);
        cache.insert(1, 1).await;
        cache.invalidate_all();
        assert!(cache.get(&1).await.is_none());
    }
}
