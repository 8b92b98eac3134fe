use rustc_hash::FxHashMap;
use spargres_common::TermValue;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Process-wide cache of terms known to be persisted.
///
/// A hit lets batch ingest skip the existence probe for that term. The cache
/// is advisory: a miss falls back to the deterministic UUID derivation, so
/// staleness can cost a redundant probe but never a wrong answer.
pub struct TermCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    map: FxHashMap<TermValue, Uuid>,
    // Insertion order; eviction is FIFO over entries still present, which
    // keeps the bound strict without per-lookup bookkeeping.
    order: VecDeque<TermValue>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermCacheStats {
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl TermCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Looks up a term, counting the hit or miss.
    pub fn get(&self, term: &TermValue) -> Option<Uuid> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.map.get(term).copied() {
            Some(uuid) => {
                inner.hits += 1;
                Some(uuid)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Records a term as persisted.
    pub fn insert(&self, term: TermValue, uuid: Uuid) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.map.insert(term.clone(), uuid).is_none() {
            inner.order.push_back(term);
        }
        while inner.map.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if inner.map.remove(&oldest).is_some() {
                inner.evictions += 1;
            }
        }
    }

    /// Forgets a single term, e.g. after deleting it from the dictionary.
    pub fn clear_term(&self, term: &TermValue) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.map.remove(term);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.map.clear();
        inner.order.clear();
    }

    pub fn stats(&self) -> TermCacheStats {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        TermCacheStats {
            len: inner.map.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(n: usize) -> TermValue {
        TermValue::uri(format!("http://example.com/{n}"))
    }

    #[test]
    fn caches_and_counts() {
        let cache = TermCache::new(8);
        let value = term(1);
        assert_eq!(cache.get(&value), None);
        cache.insert(value.clone(), value.uuid());
        assert_eq!(cache.get(&value), Some(value.uuid()));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn stays_bounded() {
        let cache = TermCache::new(4);
        for n in 0..100 {
            let value = term(n);
            cache.insert(value.clone(), value.uuid());
        }
        let stats = cache.stats();
        assert_eq!(stats.len, 4);
        assert_eq!(stats.evictions, 96);
        // The most recently inserted entries survive.
        assert!(cache.get(&term(99)).is_some());
        assert!(cache.get(&term(0)).is_none());
    }
}
