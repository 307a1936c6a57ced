//! Document ingestion.
//!
//! `IngestionService` owns the write path: deduplicate, chunk, embed and
//! store, persist the snapshot, then announce the change on the bus so
//! query caches drop answers grounded in the old corpus. Events are only
//! emitted after the snapshot is on disk.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use crate::cache::CacheEventBus;
use crate::chunking::ChunkingService;
use crate::core::errors::RagError;
use crate::store::VectorStore;

const EMITTER: &str = "IngestionService";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The document was chunked and stored.
    Added { chunks: usize },
    /// Identical content is already in the corpus under another source.
    DuplicateSkipped { original_source: String },
}

/// Content-hash registry preventing the same document text from being
/// embedded twice under different names. Keyed by full SHA-256 of the raw
/// content; values are the source that first brought the content in.
#[derive(Default)]
struct DocumentDeduplicator {
    seen: HashMap<String, String>,
}

impl DocumentDeduplicator {
    /// Forget any content previously registered for `source`, so a changed
    /// version of the same document is not flagged as its own duplicate.
    fn unregister_source(&mut self, source: &str) {
        self.seen.retain(|_, owner| owner != source);
    }

    fn original_source(&self, hash: &str) -> Option<&str> {
        self.seen.get(hash).map(String::as_str)
    }

    fn register(&mut self, hash: String, source: &str) {
        self.seen.insert(hash, source.to_string());
    }

    fn clear(&mut self) {
        self.seen.clear();
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

pub struct IngestionService {
    chunker: ChunkingService,
    store: Arc<VectorStore>,
    bus: Arc<CacheEventBus>,
    dedup: Mutex<DocumentDeduplicator>,
}

impl IngestionService {
    pub fn new(chunker: ChunkingService, store: Arc<VectorStore>, bus: Arc<CacheEventBus>) -> Self {
        Self {
            chunker,
            store,
            bus,
            dedup: Mutex::new(DocumentDeduplicator::default()),
        }
    }

    /// Ingest one document. Re-ingesting a source replaces its previous
    /// chunks; identical content under a different source is skipped.
    pub async fn add_document(
        &self,
        source: &str,
        content: &str,
    ) -> Result<IngestOutcome, RagError> {
        let hash = content_hash(content);

        if let Ok(mut dedup) = self.dedup.lock() {
            dedup.unregister_source(source);
            if let Some(original) = dedup.original_source(&hash) {
                tracing::info!(
                    "Skipping {source}: identical content already ingested as {original}"
                );
                return Ok(IngestOutcome::DuplicateSkipped {
                    original_source: original.to_string(),
                });
            }
        }

        let chunks = self.chunker.chunk_document(content, source);
        if chunks.is_empty() {
            tracing::warn!("{source} produced no chunks, nothing stored");
            if let Ok(mut dedup) = self.dedup.lock() {
                dedup.register(hash, source);
            }
            return Ok(IngestOutcome::Added { chunks: 0 });
        }

        let chunk_count = chunks.len();
        self.store.add_chunks(&chunks).await?;
        self.store.save().await?;

        if let Ok(mut dedup) = self.dedup.lock() {
            dedup.register(hash, source);
        }
        // Persisted first, then announced: subscribers reacting to the
        // event always observe the new snapshot.
        self.bus.emit_documents_changed(EMITTER);

        tracing::info!("Ingested {source}: {chunk_count} chunks");
        Ok(IngestOutcome::Added {
            chunks: chunk_count,
        })
    }

    /// Remove every document, persist the now-empty snapshot, and tell all
    /// caches to reset. Returns how many chunks were removed.
    pub async fn clear_corpus(&self) -> Result<usize, RagError> {
        let removed = self.store.clear_all().await;
        self.store.save().await?;

        if let Ok(mut dedup) = self.dedup.lock() {
            dedup.clear();
        }
        self.bus.emit_clear_all(EMITTER);

        Ok(removed)
    }

    /// Number of distinct documents currently registered.
    pub fn document_count(&self) -> usize {
        self.dedup.lock().map(|d| d.len()).unwrap_or(0)
    }
}
