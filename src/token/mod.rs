use std::sync::Arc;
use std::time::Duration;

use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::cache::{BoundedLru, CacheRegistry};
use crate::error::{IngestError, Result};

/// Counts tokens in assembled digest text using the same `cl100k_base`
/// encoding most LLM-ready-text tooling in this space targets (§4.6 calls
/// for "the tokenizer's count", not a specific one, so this core commits to
/// one encoding rather than making it pluggable). Counts are memoized by a
/// hash of the input text in a bounded LRU registered with the Cache
/// Registry, since the same digest text is sometimes recounted (retries,
/// deduplicated requests sharing a result).
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
    cache: BoundedLru<u64, usize>,
}

impl TokenCounter {
    pub fn new(cache_capacity: usize, registry: &CacheRegistry) -> Result<Self> {
        let bpe = cl100k_base()
            .map_err(|e| IngestError::Internal(format!("failed to load tokenizer: {e}")))?;
        let cache = BoundedLru::new(cache_capacity, Some(Duration::from_secs(60 * 60)));
        registry.register("token.count", cache.handle());
        Ok(Self {
            bpe: Arc::new(bpe),
            cache,
        })
    }

    pub fn count(&self, text: &str) -> usize {
        let key = fingerprint(text);
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        let count = self.bpe.encode_with_special_tokens(text).len();
        self.cache.put(key, count);
        count
    }
}

fn fingerprint(text: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
