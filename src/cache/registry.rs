use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// Point-in-time statistics for one registered cache (§4.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
    pub evictions: u64,
}

/// The subset of a cache's interface the registry needs: clear it, size it,
/// read its stats. `BoundedLru::handle()` produces one of these sharing the
/// cache's own state.
pub trait CacheHandle: Send + Sync {
    fn clear(&self) -> usize;
    fn size(&self) -> usize;
    fn stats(&self) -> CacheStats;
}

/// Process-wide mapping from cache name to a handle (§4.1). Owned by the
/// engine's builder rather than a true global singleton, so unit tests can
/// construct an isolated engine without stepping on a shared process-level
/// registry — see DESIGN.md for the rationale.
#[derive(Default)]
pub struct CacheRegistry {
    caches: Mutex<HashMap<String, Arc<dyn CacheHandle>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, handle: Arc<dyn CacheHandle>) {
        self.caches.lock().unwrap().insert(name.into(), handle);
    }

    pub fn stats(&self, name: &str) -> Option<CacheStats> {
        self.caches.lock().unwrap().get(name).map(|h| h.stats())
    }

    /// Clears every registered cache, returning the number of entries
    /// evicted from each. A cache that panics during `clear()` is logged and
    /// skipped rather than aborting the sweep.
    pub fn clear_all(&self) -> HashMap<String, usize> {
        let caches: Vec<(String, Arc<dyn CacheHandle>)> = self
            .caches
            .lock()
            .unwrap()
            .iter()
            .map(|(name, handle)| (name.clone(), handle.clone()))
            .collect();

        let mut results = HashMap::new();
        for (name, handle) in caches {
            match panic::catch_unwind(AssertUnwindSafe(|| handle.clear())) {
                Ok(count) => {
                    results.insert(name, count);
                }
                Err(_) => {
                    log::error!("cache '{name}' panicked during clear_all, skipping");
                }
            }
        }
        results
    }

    /// Clears caches in `priority_order` until either all named caches are
    /// drained or `memory_pressure_abated` reports the pressure has eased,
    /// invoked by the memory monitor (§4.8). Unregistered names are skipped.
    pub fn pressure_clear(
        &self,
        priority_order: &[&str],
        mut memory_pressure_abated: impl FnMut() -> bool,
    ) -> HashMap<String, usize> {
        let mut results = HashMap::new();
        for name in priority_order {
            if memory_pressure_abated() {
                break;
            }
            let handle = self.caches.lock().unwrap().get(*name).cloned();
            let Some(handle) = handle else { continue };
            match panic::catch_unwind(AssertUnwindSafe(|| handle.clear())) {
                Ok(count) => {
                    results.insert((*name).to_string(), count);
                }
                Err(_) => {
                    log::error!("cache '{name}' panicked during pressure_clear, skipping");
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::lru::BoundedLru;

    #[test]
    fn clear_all_reports_per_cache_counts() {
        let registry = CacheRegistry::new();
        let a: BoundedLru<i32, i32> = BoundedLru::new(4, None);
        let b: BoundedLru<i32, i32> = BoundedLru::new(4, None);
        a.put(1, 1);
        b.put(1, 1);
        b.put(2, 2);
        registry.register("a", a.handle());
        registry.register("b", b.handle());

        let results = registry.clear_all();
        assert_eq!(results.get("a"), Some(&1));
        assert_eq!(results.get("b"), Some(&2));
    }

    #[test]
    fn pressure_clear_stops_once_abated() {
        let registry = CacheRegistry::new();
        let a: BoundedLru<i32, i32> = BoundedLru::new(4, None);
        let b: BoundedLru<i32, i32> = BoundedLru::new(4, None);
        a.put(1, 1);
        b.put(1, 1);
        registry.register("a", a.handle());
        registry.register("b", b.handle());

        let mut calls = 0;
        let results = registry.pressure_clear(&["a", "b"], || {
            calls += 1;
            calls > 1
        });
        assert_eq!(results.get("a"), Some(&1));
        assert!(!results.contains_key("b"));
    }
}
