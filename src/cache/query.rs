//! Question → answer cache.
//!
//! Keys are derived from the question after literal normalization
//! (lowercase, trim, collapse whitespace runs), so trivially different
//! phrasings of the same string share an entry. This is deliberately NOT
//! semantic deduplication: similarity-based cache hits were evaluated and
//! rejected, exact normalized keys only.
//!
//! Cached answers become wrong the moment the corpus changes, hence the
//! short TTL and the expectation that owners clear this cache on
//! `documents:changed` events.

use std::time::Duration;

use sha2::{Digest, Sha256};

use super::lru::{CacheStats, LruCache};
use crate::chat::ChatResponse;

const KEY_LEN: usize = 16;

pub struct QueryCache {
    cache: LruCache<ChatResponse>,
}

impl QueryCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            cache: LruCache::new(max_entries, ttl),
        }
    }

    pub fn get(&mut self, question: &str) -> Option<ChatResponse> {
        let cached = self.cache.get(&cache_key(question));
        if cached.is_some() {
            tracing::info!("Query cache hit for {:?}", truncate(question, 50));
        }
        cached
    }

    pub fn insert(&mut self, question: &str, response: ChatResponse) {
        self.cache.insert(&cache_key(question), response);
        tracing::debug!("Cached answer for {:?}", truncate(question, 50));
    }

    pub fn contains(&mut self, question: &str) -> bool {
        self.cache.contains(&cache_key(question))
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        tracing::info!("Query cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }
}

fn normalize(question: &str) -> String {
    question
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn cache_key(question: &str) -> String {
    let digest = Sha256::digest(normalize(question).as_bytes());
    hex::encode(digest)[..KEY_LEN].to_string()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
