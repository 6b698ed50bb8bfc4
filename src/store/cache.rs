//! Bounded memo cache for reader lookups

use super::types::{BarField, Sid};
use crate::telemetry::{increment, CounterMetric};
use chrono::NaiveDate;
use lru::LruCache;
use ndarray::Array2;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Exact argument tuple of a memoised lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Value {
        sid: Sid,
        date: NaiveDate,
        field: BarField,
    },
    RawArrays {
        fields: Vec<BarField>,
        start: NaiveDate,
        end: NaiveDate,
        sids: Vec<Sid>,
    },
}

/// Memoised result
#[derive(Debug, Clone)]
pub enum CacheEntry {
    Value(f64),
    RawArrays(Arc<Vec<Array2<f64>>>),
}

/// LRU cache shared by all reader calls. Capacity 0 disables caching.
pub struct QueryCache {
    entries: Option<Mutex<LruCache<CacheKey, CacheEntry>>>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Look up a key, recording hit/miss counters
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entries = self.entries.as_ref()?;
        let found = entries.lock().get(key).cloned();
        match found {
            Some(_) => increment(CounterMetric::CacheHits, 1),
            None => increment(CounterMetric::CacheMisses, 1),
        }
        found
    }

    pub fn put(&self, key: CacheKey, entry: CacheEntry) {
        if let Some(entries) = &self.entries {
            entries.lock().put(key, entry);
        }
    }

    /// Drop every memoised result
    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map(|e| e.lock().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .as_ref()
            .map(|e| e.lock().cap().get())
            .unwrap_or(0)
    }
}
