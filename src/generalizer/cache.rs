//! Session-scoped cache of successful generalizations.
//!
//! Keys hash the signal id together with its text, dimension and the prompt
//! version, so a signal whose content changes under the same id misses the
//! cache instead of receiving a stale rewrite. Capacity is bounded with
//! first-in-first-out eviction.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::types::{GeneralizationProvenance, Signal};

/// A cached rewrite and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedGeneralization {
    pub text: String,
    pub embedding: Vec<f32>,
    pub provenance: GeneralizationProvenance,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CachedGeneralization>,
    order: VecDeque<String>,
}

/// Bounded, thread-safe generalization cache.
///
/// Owned by a synthesis session; nothing else reads or writes it.
#[derive(Debug)]
pub struct GeneralizationCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl GeneralizationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Cache key for a signal under a prompt version.
    pub fn key(signal: &Signal, prompt_version: &str) -> String {
        let mut hasher = Sha256::new();
        for part in [
            signal.id().as_str(),
            signal.text(),
            signal.dimension().map(|d| d.as_str()).unwrap_or(""),
            prompt_version,
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Cached generalization for `key`, if present.
    pub fn get(&self, key: &str) -> Option<CachedGeneralization> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Store an entry, evicting the oldest once over capacity.
    pub fn insert(&self, key: String, value: CachedGeneralization) {
        let mut inner = self.inner.lock();
        if inner.entries.insert(key.clone(), value).is_none() {
            inner.order.push_back(key);
        }
        while inner.entries.len() > self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Drop every entry. Marks the boundary between independent runs.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dimension, SignalSource, SourceType};
    use chrono::Utc;

    fn signal(id: &str, text: &str) -> Signal {
        Signal::new(id, text, SignalSource::new("memory.md", SourceType::Memory))
    }

    fn entry(text: &str) -> CachedGeneralization {
        CachedGeneralization {
            text: text.to_string(),
            embedding: vec![1.0, 0.0],
            provenance: GeneralizationProvenance {
                model: "m".to_string(),
                prompt_version: "v1".to_string(),
                generated_at: Utc::now(),
                confidence: 1.0,
                attempts: 1,
                used_fallback: false,
            },
        }
    }

    #[test]
    fn test_key_changes_with_content_under_same_id() {
        let a = GeneralizationCache::key(&signal("s1", "Prefer brevity"), "v1");
        let b = GeneralizationCache::key(&signal("s1", "Prefer verbosity"), "v1");
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_changes_with_dimension_and_prompt_version() {
        let base = signal("s1", "Prefer brevity");
        let with_dim = base.clone().with_dimension(Dimension::VoicePresence);
        assert_ne!(
            GeneralizationCache::key(&base, "v1"),
            GeneralizationCache::key(&with_dim, "v1")
        );
        assert_ne!(
            GeneralizationCache::key(&base, "v1"),
            GeneralizationCache::key(&base, "v2")
        );
    }

    #[test]
    fn test_key_is_stable() {
        let s = signal("s1", "Prefer brevity");
        assert_eq!(GeneralizationCache::key(&s, "v1"), GeneralizationCache::key(&s, "v1"));
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = GeneralizationCache::new(2);
        cache.insert("a".into(), entry("A"));
        cache.insert("b".into(), entry("B"));
        cache.insert("c".into(), entry("C"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c").unwrap().text, "C");
    }

    #[test]
    fn test_reinsert_does_not_duplicate_order() {
        let cache = GeneralizationCache::new(2);
        cache.insert("a".into(), entry("A"));
        cache.insert("a".into(), entry("A2"));
        cache.insert("b".into(), entry("B"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().text, "A2");
    }

    #[test]
    fn test_clear() {
        let cache = GeneralizationCache::new(8);
        cache.insert("a".into(), entry("A"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
