//! Question answering over the stored corpus.
//!
//! `ChatService` runs the retrieve → augment → generate flow and fronts it
//! with the query cache. The cache is keyed by the normalized question and
//! cleared whenever the invalidation bus reports a corpus change, so a
//! cached answer can never outlive the documents it was grounded in.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheEventBus, CacheStats, QueryCache};
use crate::chunking::Chunk;
use crate::core::config::{CacheConfig, RetrievalConfig};
use crate::core::errors::RagError;
use crate::llm::{GenerationProvider, PromptBuilder};
use crate::store::VectorStore;

/// Fixed reply when retrieval finds nothing to ground an answer in.
/// Deliberately not cached: the next ingestion should change it.
const NO_CONTEXT_ANSWER: &str =
    "I don't have any documentation to answer that question yet. Try adding documents first.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    /// Chunks the answer was grounded in, in retrieval order.
    pub sources: Vec<Chunk>,
    /// Whether this response was served from the query cache.
    pub cached: bool,
}

pub struct ChatService {
    store: Arc<VectorStore>,
    generator: Arc<dyn GenerationProvider>,
    prompt_builder: PromptBuilder,
    query_cache: Arc<Mutex<QueryCache>>,
    top_k: usize,
}

impl ChatService {
    /// Build the service and subscribe its query cache to the bus: both
    /// `documents:changed` and `cache:clear-all` drop every cached answer.
    pub fn new(
        store: Arc<VectorStore>,
        generator: Arc<dyn GenerationProvider>,
        bus: &CacheEventBus,
        cache: &CacheConfig,
        retrieval: &RetrievalConfig,
    ) -> Self {
        let query_cache = Arc::new(Mutex::new(QueryCache::new(
            cache.max_entries,
            Duration::from_secs(cache.ttl_secs),
        )));

        let subscribed = Arc::clone(&query_cache);
        bus.on_documents_changed("ChatService", move || {
            if let Ok(mut cache) = subscribed.lock() {
                cache.clear();
            }
        });
        let subscribed = Arc::clone(&query_cache);
        bus.on_clear_all("ChatService", move || {
            if let Ok(mut cache) = subscribed.lock() {
                cache.clear();
            }
        });

        Self {
            store,
            generator,
            prompt_builder: PromptBuilder::new(),
            query_cache,
            top_k: retrieval.top_k,
        }
    }

    /// Answer a question. Cache hit short-circuits everything; otherwise
    /// retrieve the best chunks, build the grounded prompt, generate, and
    /// cache the fresh answer under the original question.
    pub async fn ask(&self, question: &str) -> Result<ChatResponse, RagError> {
        if let Ok(mut cache) = self.query_cache.lock() {
            if let Some(mut response) = cache.get(question) {
                response.cached = true;
                return Ok(response);
            }
        }

        let chunks = self.store.search(question, self.top_k).await?;
        if chunks.is_empty() {
            tracing::info!("No relevant chunks found, skipping generation");
            return Ok(ChatResponse {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
                cached: false,
            });
        }

        let prompt = self.prompt_builder.build_rag_prompt(question, &chunks);
        let answer = self.generator.generate(&prompt).await?;

        let response = ChatResponse {
            answer,
            sources: chunks,
            cached: false,
        };
        if let Ok(mut cache) = self.query_cache.lock() {
            cache.insert(question, response.clone());
        }
        Ok(response)
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.query_cache.lock().ok().map(|cache| cache.stats())
    }

    /// Manually drop every cached answer. Normally the bus does this.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.query_cache.lock() {
            cache.clear();
        }
    }
}
