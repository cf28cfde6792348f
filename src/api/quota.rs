use std::sync::atomic::{AtomicU64, Ordering};

/// Per-endpoint quota unit cost, per the Data API v3 pricing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCost {
    Search,
    List,
    CaptionsList,
}

impl QuotaCost {
    pub fn units(self) -> u64 {
        match self {
            QuotaCost::Search => 100,
            QuotaCost::List => 1,
            QuotaCost::CaptionsList => 50,
        }
    }
}

/// Tracks call count and quota units spent over the lifetime of one
/// `ingest()` call, surfaced in `IngestResult::api_call_count` /
/// `api_quota_used` (§4.3).
#[derive(Debug, Default)]
pub struct QuotaTracker {
    calls: AtomicU64,
    units: AtomicU64,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, cost: QuotaCost) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.units.fetch_add(cost.units(), Ordering::Relaxed);
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn units_used(&self) -> u64 {
        self.units.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_calls_and_units() {
        let tracker = QuotaTracker::new();
        tracker.record(QuotaCost::Search);
        tracker.record(QuotaCost::List);
        tracker.record(QuotaCost::List);
        assert_eq!(tracker.call_count(), 3);
        assert_eq!(tracker.units_used(), 100 + 1 + 1);
    }
}
