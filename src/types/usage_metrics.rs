//! Provider usage accounting for a synthesis session.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of provider usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// LLM calls issued.
    pub llm_requests: u64,
    /// Embedding requests issued.
    pub embedding_requests: u64,
    /// Provider requests that returned an error or timed out.
    pub failed_requests: u64,
    /// Generalizations that fell back to the original text.
    pub fallbacks: u64,
    /// Generalization cache hits.
    pub cache_hits: u64,
    /// Generalization cache misses.
    pub cache_misses: u64,
}

/// Lock-free counters shared by concurrent provider calls.
#[derive(Debug, Default)]
pub struct UsageTracker {
    llm_requests: AtomicU64,
    embedding_requests: AtomicU64,
    failed_requests: AtomicU64,
    fallbacks: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one LLM request.
    pub fn record_llm_request(&self) {
        self.llm_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one embedding call.
    pub fn record_embedding_request(&self) {
        self.embedding_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a provider call that errored or timed out.
    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a generalization that kept the original text.
    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a cache lookup as a hit or a miss.
    pub fn record_cache(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current counter values.
    pub fn snapshot(&self) -> UsageMetrics {
        UsageMetrics {
            llm_requests: self.llm_requests.load(Ordering::Relaxed),
            embedding_requests: self.embedding_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_snapshot() {
        let tracker = UsageTracker::new();
        tracker.record_llm_request();
        tracker.record_llm_request();
        tracker.record_failure();
        tracker.record_cache(true);
        tracker.record_cache(false);
        let snap = tracker.snapshot();
        assert_eq!(snap.llm_requests, 2);
        assert_eq!(snap.failed_requests, 1);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.cache_misses, 1);
    }
}
