use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::registry::{CacheHandle, CacheStats};

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
    last_used: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    capacity: usize,
    default_ttl: Option<Duration>,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> Inner<K, V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_one(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions += 1;
        }
    }
}

/// A size-bounded key/value store with optional per-entry time-to-live
/// (§4.2). Recency is tracked with a monotonic logical clock rather than an
/// intrusive linked list: eviction scans for the minimum `last_used` among at
/// most `capacity` entries, which is cheap relative to the network I/O this
/// cache exists to avoid, and keeps the implementation free of unsafe code.
/// A single mutex guards all state, matching the "contention is not a
/// bottleneck" concurrency note in §4.2.
pub struct BoundedLru<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
}

impl<K, V> Clone for BoundedLru<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: Eq + Hash + Clone + Send + 'static, V: Clone + Send + 'static> BoundedLru<K, V> {
    pub fn new(capacity: usize, default_ttl: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                capacity: capacity.max(1),
                default_ttl,
                clock: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            })),
        }
    }

    /// Returns the stored value if present and not expired, updating
    /// recency; otherwise reports a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let hit = match inner.entries.get(key) {
            Some(entry) => entry.expires_at.map(|exp| now < exp).unwrap_or(true),
            None => false,
        };

        if !hit {
            if inner.entries.contains_key(key) {
                inner.entries.remove(key);
            }
            inner.misses += 1;
            return None;
        }

        let tick = inner.tick();
        let entry = inner.entries.get_mut(key).unwrap();
        entry.last_used = tick;
        let value = entry.value.clone();
        inner.hits += 1;
        Some(value)
    }

    /// Inserts or updates, evicting the least-recently-used entry when size
    /// exceeds capacity, using this cache's default TTL.
    pub fn put(&self, key: K, value: V) {
        self.put_with_ttl(key, value, None);
    }

    /// Inserts or updates with an explicit TTL override (`Some(duration)`
    /// replaces the default, `None` falls back to the default).
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) {
        let mut inner = self.inner.lock().unwrap();
        let ttl = ttl.or(inner.default_ttl);
        let expires_at = ttl.map(|d| Instant::now() + d);
        let tick = inner.tick();
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at,
                last_used: tick,
            },
        );
        while inner.entries.len() > inner.capacity {
            inner.evict_one();
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.entries.len(),
            capacity: inner.capacity,
            evictions: inner.evictions,
        }
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let count = inner.entries.len();
        inner.entries.clear();
        count
    }

    /// A trait object sharing this cache's underlying state, suitable for
    /// registration with a `CacheRegistry`.
    pub fn handle(&self) -> Arc<dyn CacheHandle>
    where
        K: Sync,
        V: Sync,
    {
        Arc::new(LruHandle {
            inner: self.inner.clone(),
        })
    }
}

struct LruHandle<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
}

impl<K: Eq + Hash + Clone + Send + Sync, V: Clone + Send + Sync> CacheHandle for LruHandle<K, V> {
    fn clear(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let count = inner.entries.len();
        inner.entries.clear();
        count
    }

    fn size(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.entries.len(),
            capacity: inner.capacity,
            evictions: inner.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_hit_and_miss() {
        let cache: BoundedLru<String, u32> = BoundedLru::new(4, None);
        assert_eq!(cache.get(&"a".to_string()), None);
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache: BoundedLru<i32, i32> = BoundedLru::new(2, None);
        cache.put(1, 1);
        cache.put(2, 2);
        cache.get(&1); // 1 is now more recently used than 2
        cache.put(3, 3); // evicts 2
        assert_eq!(cache.get(&1), Some(1));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&3), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn respects_ttl() {
        let cache: BoundedLru<&str, i32> = BoundedLru::new(4, None);
        cache.put_with_ttl("k", 1, Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"k"), None);
    }

    #[test]
    fn clear_reports_evicted_count() {
        let cache: BoundedLru<i32, i32> = BoundedLru::new(4, None);
        cache.put(1, 1);
        cache.put(2, 2);
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.size(), 0);
    }
}
