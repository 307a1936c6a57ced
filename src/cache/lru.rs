//! Bounded LRU cache with per-entry TTL.
//!
//! Sits on the hot path of every query, so `get`/`insert` stay O(1) on the
//! map; the recency queue reposition is linear in the entry count, which is
//! bounded by `max_size` (a few hundred entries in practice). Expiry is
//! lazy: an expired entry is removed by the observing call, there is no
//! background sweep.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Read-only view of cache counters, recomputed on each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub max_size: usize,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct LruCache<V> {
    max_size: usize,
    ttl: Duration,
    entries: HashMap<String, CacheEntry<V>>,
    /// Recency order: front is least recently used, back is most recent.
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl<V: Clone> LruCache<V> {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size: max_size.max(1),
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the value for `key` and mark it most recently used.
    ///
    /// An expired entry behaves as absent: it is removed here and counted
    /// as a miss.
    pub fn get(&mut self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            None => {
                self.misses += 1;
                None
            }
            Some(entry) if Instant::now() >= entry.expires_at => {
                self.remove(key);
                self.misses += 1;
                None
            }
            Some(entry) => {
                let value = entry.value.clone();
                self.touch(key);
                self.hits += 1;
                Some(value)
            }
        }
    }

    /// Insert or replace `key`, repositioning it as most recently used.
    ///
    /// The expiry is always `now + ttl`, even when replacing an older entry.
    /// Inserting a new key at capacity evicts the least recently used entry.
    pub fn insert(&mut self, key: &str, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };

        if self.entries.insert(key.to_string(), entry).is_some() {
            self.touch(key);
            return;
        }

        if self.entries.len() > self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.to_string());
    }

    /// Read-only freshness probe: same lazy expiry as `get`, but does not
    /// update recency order or hit/miss counters.
    pub fn contains(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            None => false,
            Some(entry) if Instant::now() >= entry.expires_at => {
                self.remove(key);
                false
            }
            Some(_) => true,
        }
    }

    /// Remove `key`; returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            if let Some(pos) = self.order.iter().position(|k| k == key) {
                self.order.remove(pos);
            }
        }
        removed
    }

    /// Drop all entries and reset hit/miss counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
            max_size: self.max_size,
        }
    }

    /// Hit rate as a percentage; 0 when nothing has been accessed yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }
}
