//! Caching layer.
//!
//! `LruCache` is the bounded LRU + TTL building block; `EmbeddingCache` and
//! `QueryCache` specialize it with hashed key derivation. `CacheEventBus`
//! carries invalidation events between the ingestion side and long-lived
//! cache owners.

mod embedding;
mod events;
mod lru;
mod query;

pub use embedding::EmbeddingCache;
pub use events::{CacheEvent, CacheEventBus};
pub use lru::{CacheStats, LruCache};
pub use query::QueryCache;
