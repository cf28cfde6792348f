use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::error::{IngestError, Result};
use crate::types::IngestResult;

type Slot = Arc<OnceCell<Result<IngestResult>>>;

/// Deduplicates concurrent `ingest()` calls sharing the same request
/// fingerprint (§4.5 "Deduplication"): the first caller for a fingerprint
/// runs `work`, later callers for the same fingerprint await the same
/// in-flight result instead of repeating it. Once the call completes the
/// fingerprint is forgotten, so a later, non-overlapping request with the
/// same fingerprint starts fresh rather than replaying a stale result.
pub struct InFlightRegistry {
    inner: Mutex<HashMap<String, Slot>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run_or_join<F, Fut>(&self, fingerprint: String, work: F) -> Result<IngestResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IngestResult>>,
    {
        let slot = {
            let mut map = self.inner.lock().await;
            map.entry(fingerprint.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = slot.get_or_init(work).await.clone();

        let mut map = self.inner.lock().await;
        if let Some(existing) = map.get(&fingerprint) {
            if Arc::ptr_eq(existing, &slot) {
                map.remove(&fingerprint);
            }
        }

        result
    }
}

impl Default for InFlightRegistry {
    fn default() -> Self {
        Self::new()
    }
}
