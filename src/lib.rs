//! docrag — retrieval and caching engine for question answering over a
//! private document corpus.
//!
//! The crate turns raw document text into heading-aware chunks, stores them
//! with embeddings in an in-memory [`store::VectorStore`] (snapshotted to
//! disk), and answers questions through [`chat::ChatService`], which layers
//! a query cache and an embedding cache over the retrieve → augment →
//! generate flow. Cache consistency across components is maintained by the
//! [`cache::CacheEventBus`].
//!
//! Transport, file validation and UI concerns live outside this crate; the
//! embedding and generation models are consumed through the provider traits
//! in [`llm`].

pub mod cache;
pub mod chat;
pub mod chunking;
pub mod core;
pub mod ingestion;
pub mod llm;
pub mod logging;
pub mod store;

pub use cache::{CacheEventBus, CacheStats, EmbeddingCache, LruCache, QueryCache};
pub use chat::{ChatResponse, ChatService};
pub use chunking::{Chunk, ChunkMetadata, ChunkingService};
pub use crate::core::config::RagConfig;
pub use crate::core::errors::RagError;
pub use ingestion::{IngestOutcome, IngestionService};
pub use llm::{EmbeddingProvider, GenerationProvider};
pub use store::VectorStore;
