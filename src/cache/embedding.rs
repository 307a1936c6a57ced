//! Text → embedding cache.
//!
//! Embeddings are a deterministic function of their input text, so entries
//! only go stale when the embedding model itself changes. That is an
//! out-of-band event: whoever swaps the model must call [`EmbeddingCache::clear`].

use std::time::Duration;

use sha2::{Digest, Sha256};

use super::lru::{CacheStats, LruCache};

/// Truncated-hash key length; collisions at 128 bits are an accepted,
/// vanishingly small risk.
const KEY_LEN: usize = 32;

pub struct EmbeddingCache {
    cache: LruCache<Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            cache: LruCache::new(max_entries, ttl),
        }
    }

    pub fn get(&mut self, text: &str) -> Option<Vec<f32>> {
        let cached = self.cache.get(&cache_key(text));
        if cached.is_some() {
            tracing::debug!("Embedding cache hit ({} chars)", text.len());
        }
        cached
    }

    pub fn insert(&mut self, text: &str, embedding: Vec<f32>) {
        self.cache.insert(&cache_key(text), embedding);
    }

    pub fn contains(&mut self, text: &str) -> bool {
        self.cache.contains(&cache_key(text))
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        tracing::info!("Embedding cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }
}

fn cache_key(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)[..KEY_LEN].to_string()
}
