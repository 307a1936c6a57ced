//! In-memory vector store with a JSON snapshot on disk.
//!
//! Chunks and their embeddings live in memory; search is a linear cosine
//! scan, which stays comfortably fast for documentation-sized corpora.
//! The snapshot is the only persistence: saves go through a temp file and
//! an atomic rename, and loads soft-fail so a damaged snapshot never stops
//! the engine from starting empty.

mod similarity;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::cache::{CacheStats, EmbeddingCache};
use crate::chunking::Chunk;
use crate::core::config::CacheConfig;
use crate::core::errors::RagError;
use crate::llm::EmbeddingProvider;
use similarity::{compare_scores_desc, cosine_similarity};

const SNAPSHOT_VERSION: u32 = 1;

/// A chunk together with its embedding. Snapshot-internal: search results
/// hand out plain [`Chunk`]s, never the vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    #[serde(flatten)]
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// On-disk snapshot format. The header pins the embedding model and
/// dimension so a snapshot written under one model is never mixed with
/// vectors from another.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    model: String,
    dimensions: usize,
    saved_at: DateTime<Utc>,
    chunks: Vec<StoredChunk>,
}

#[derive(Default)]
struct StoreState {
    chunks: Vec<StoredChunk>,
    /// Modification time of the snapshot we last wrote or loaded. Used by
    /// [`VectorStore::reload_if_changed`] to detect writes from other
    /// processes sharing the file.
    snapshot_mtime: Option<SystemTime>,
}

pub struct VectorStore {
    state: RwLock<StoreState>,
    embeddings: Arc<dyn EmbeddingProvider>,
    snapshot_path: PathBuf,
    // std Mutex, never held across an await point.
    embedding_cache: Mutex<EmbeddingCache>,
}

impl VectorStore {
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        snapshot_path: impl Into<PathBuf>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            embeddings,
            snapshot_path: snapshot_path.into(),
            embedding_cache: Mutex::new(EmbeddingCache::new(
                cache.max_entries,
                Duration::from_secs(cache.ttl_secs),
            )),
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Embed and store a batch of chunks. Any source present in the batch
    /// is replaced wholesale, so re-ingesting a document never leaves stale
    /// chunks from its previous version behind.
    ///
    /// Chunks are appended as each embedding arrives; if the provider fails
    /// partway, the chunks embedded so far remain and the caller is expected
    /// to retry the whole document (replacement makes the retry idempotent).
    pub async fn add_chunks(&self, chunks: &[Chunk]) -> Result<(), RagError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let sources: HashSet<&str> = chunks
            .iter()
            .map(|c| c.metadata.source.as_str())
            .collect();
        {
            let mut state = self.state.write().await;
            let before = state.chunks.len();
            state
                .chunks
                .retain(|s| !sources.contains(s.chunk.metadata.source.as_str()));
            let replaced = before - state.chunks.len();
            if replaced > 0 {
                tracing::info!("Replacing {replaced} chunks from re-ingested sources");
            }
        }

        tracing::info!("Generating embeddings for {} chunks", chunks.len());
        for chunk in chunks {
            let embedding = self.embeddings.generate_embedding(&chunk.text).await?;
            self.check_dimension(&embedding)?;

            let mut state = self.state.write().await;
            state.chunks.push(StoredChunk {
                chunk: chunk.clone(),
                embedding,
            });
        }

        Ok(())
    }

    /// Rank stored chunks against the query by cosine similarity and return
    /// the best `top_k` (0 means no limit). An empty store returns no
    /// results without touching the embedding provider.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Chunk>, RagError> {
        if self.state.read().await.chunks.is_empty() {
            tracing::debug!("Search on empty store, returning no results");
            return Ok(Vec::new());
        }

        let query_embedding = self.query_embedding(query).await?;

        let state = self.state.read().await;
        let mut scored: Vec<(f32, &StoredChunk)> = state
            .chunks
            .iter()
            .map(|s| (cosine_similarity(&query_embedding, &s.embedding), s))
            .collect();
        // Stable sort: equal scores keep insertion order, NaN sinks last.
        scored.sort_by(|a, b| compare_scores_desc(a.0, b.0));

        let limit = if top_k == 0 {
            scored.len()
        } else {
            top_k.min(scored.len())
        };
        let results: Vec<Chunk> = scored[..limit]
            .iter()
            .map(|(_, s)| s.chunk.clone())
            .collect();

        if let Some((score, best)) = scored.first() {
            tracing::debug!(
                "Search returned {} of {} chunks (best: {} at {:.3})",
                results.len(),
                state.chunks.len(),
                best.chunk.id,
                score
            );
        }

        Ok(results)
    }

    /// Query embeddings go through the embedding cache: repeated questions
    /// within the TTL cost zero provider calls here.
    async fn query_embedding(&self, query: &str) -> Result<Vec<f32>, RagError> {
        if let Ok(mut cache) = self.embedding_cache.lock() {
            if let Some(embedding) = cache.get(query) {
                return Ok(embedding);
            }
        }

        let embedding = self.embeddings.generate_embedding(query).await?;
        self.check_dimension(&embedding)?;

        if let Ok(mut cache) = self.embedding_cache.lock() {
            cache.insert(query, embedding.clone());
        }
        Ok(embedding)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), RagError> {
        let expected = self.embeddings.dimensions();
        if embedding.len() != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    /// Write the snapshot: serialize to a temp file next to the target,
    /// then rename into place so readers never observe a half-written file.
    pub async fn save(&self) -> Result<(), RagError> {
        let snapshot = {
            let state = self.state.read().await;
            Snapshot {
                version: SNAPSHOT_VERSION,
                model: self.embeddings.model_name().to_string(),
                dimensions: self.embeddings.dimensions(),
                saved_at: Utc::now(),
                chunks: state.chunks.clone(),
            }
        };
        let chunk_count = snapshot.chunks.len();
        let data = serde_json::to_vec_pretty(&snapshot)?;

        let mut tmp = self.snapshot_path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp_path = PathBuf::from(tmp);

        tokio::fs::write(&tmp_path, &data).await?;
        tokio::fs::rename(&tmp_path, &self.snapshot_path).await?;

        // Record our own write so reload_if_changed does not see it as an
        // external change.
        let mtime = file_mtime(&self.snapshot_path).await;
        self.state.write().await.snapshot_mtime = mtime;

        tracing::info!(
            "Saved {} chunks to {}",
            chunk_count,
            self.snapshot_path.display()
        );
        Ok(())
    }

    /// Load the snapshot if a usable one exists. Missing, unreadable,
    /// unparseable, or model-mismatched snapshots are soft failures: they
    /// are logged and the in-memory state is left untouched.
    pub async fn load(&self) {
        let data = match tokio::fs::read(&self.snapshot_path).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(
                    "No usable snapshot at {}: {e}; starting empty",
                    self.snapshot_path.display()
                );
                return;
            }
        };

        let snapshot: Snapshot = match serde_json::from_slice(&data) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    "Ignoring corrupt snapshot at {}: {e}",
                    self.snapshot_path.display()
                );
                return;
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                "Ignoring snapshot with unsupported version {}",
                snapshot.version
            );
            return;
        }
        if snapshot.model != self.embeddings.model_name()
            || snapshot.dimensions != self.embeddings.dimensions()
        {
            tracing::warn!(
                "Ignoring snapshot written for model {} ({}d); store is configured for {} ({}d)",
                snapshot.model,
                snapshot.dimensions,
                self.embeddings.model_name(),
                self.embeddings.dimensions()
            );
            return;
        }

        let mtime = file_mtime(&self.snapshot_path).await;
        let chunk_count = snapshot.chunks.len();
        {
            let mut state = self.state.write().await;
            state.chunks = snapshot.chunks;
            state.snapshot_mtime = mtime;
        }
        tracing::info!(
            "Loaded {} chunks from {}",
            chunk_count,
            self.snapshot_path.display()
        );
    }

    /// Reload the snapshot when another writer has updated it since our
    /// last save or load. Returns whether a reload happened. Detection is
    /// by file mtime, so it is only as granular as the filesystem clock.
    pub async fn reload_if_changed(&self) -> bool {
        let Some(current) = file_mtime(&self.snapshot_path).await else {
            return false;
        };

        let changed = match self.state.read().await.snapshot_mtime {
            None => true,
            Some(last) => current > last,
        };
        if !changed {
            return false;
        }

        tracing::info!("Snapshot changed on disk, reloading");
        self.load().await;
        true
    }

    /// Drop every chunk from memory and report how many were removed.
    /// Does not touch the snapshot; callers decide whether to persist.
    pub async fn clear_all(&self) -> usize {
        let mut state = self.state.write().await;
        let removed = state.chunks.len();
        state.chunks.clear();
        tracing::info!("Cleared {removed} chunks from vector store");
        removed
    }

    pub async fn chunk_count(&self) -> usize {
        self.state.read().await.chunks.len()
    }

    pub fn embedding_cache_stats(&self) -> Option<CacheStats> {
        self.embedding_cache.lock().ok().map(|cache| cache.stats())
    }

    /// Drop all cached query embeddings.
    pub fn clear_embedding_cache(&self) {
        if let Ok(mut cache) = self.embedding_cache.lock() {
            cache.clear();
        }
    }
}

async fn file_mtime(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::chunking::ChunkMetadata;

    /// Deterministic in-process embedding provider. Known texts map to
    /// hand-picked vectors so similarity ordering is controllable; unknown
    /// texts fall back to a byte-derived vector.
    struct StubEmbeddings {
        dims: usize,
        model: String,
        vectors: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
        fail_on: Option<String>,
    }

    impl StubEmbeddings {
        fn new(dims: usize) -> Self {
            Self {
                dims,
                model: "stub-embed".to_string(),
                vectors: HashMap::new(),
                calls: AtomicUsize::new(0),
                fail_on: None,
            }
        }

        fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(text.to_string(), vector);
            self
        }

        fn failing_on(mut self, text: &str) -> Self {
            self.fail_on = Some(text.to_string());
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbeddings {
        async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, RagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.as_deref() == Some(text) {
                return Err(RagError::upstream("stub", "provider down"));
            }
            if let Some(vector) = self.vectors.get(text) {
                return Ok(vector.clone());
            }
            let seed = text.bytes().map(usize::from).sum::<usize>();
            Ok((0..self.dims)
                .map(|i| ((seed + i) % 10) as f32 + 1.0)
                .collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }

    fn chunk(text: &str, source: &str, index: usize) -> Chunk {
        Chunk {
            id: format!("{source}-chunk-{index}"),
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                heading: None,
                index,
            },
        }
    }

    fn cache_config() -> CacheConfig {
        CacheConfig {
            max_entries: 100,
            ttl_secs: 3600,
        }
    }

    fn store_at(dir: &TempDir, provider: Arc<StubEmbeddings>) -> VectorStore {
        VectorStore::new(provider, dir.path().join("store.json"), &cache_config())
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let provider = Arc::new(
            StubEmbeddings::new(2)
                .with_vector("north", vec![1.0, 0.0])
                .with_vector("east", vec![0.0, 1.0])
                .with_vector("northeast", vec![0.7, 0.7])
                .with_vector("mostly north?", vec![0.9, 0.1]),
        );
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, provider);

        store
            .add_chunks(&[
                chunk("east", "doc.md", 0),
                chunk("north", "doc.md", 1),
                chunk("northeast", "doc.md", 2),
            ])
            .await
            .unwrap();

        let results = store.search("mostly north?", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "north");
        assert_eq!(results[1].text, "northeast");
    }

    #[tokio::test]
    async fn empty_store_search_skips_the_provider() {
        let provider = Arc::new(StubEmbeddings::new(2));
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, Arc::clone(&provider));

        let results = store.search("anything", 5).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn repeated_queries_reuse_the_cached_embedding() {
        let provider = Arc::new(StubEmbeddings::new(2));
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, Arc::clone(&provider));

        store.add_chunks(&[chunk("body", "doc.md", 0)]).await.unwrap();
        let after_ingest = provider.calls();

        store.search("same question", 1).await.unwrap();
        store.search("same question", 1).await.unwrap();

        // One embedding call for the query, not two.
        assert_eq!(provider.calls(), after_ingest + 1);
    }

    #[tokio::test]
    async fn top_k_zero_means_no_limit() {
        let provider = Arc::new(StubEmbeddings::new(2));
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, provider);

        store
            .add_chunks(&[
                chunk("a", "doc.md", 0),
                chunk("b", "doc.md", 1),
                chunk("c", "doc.md", 2),
            ])
            .await
            .unwrap();

        assert_eq!(store.search("q", 0).await.unwrap().len(), 3);
        assert_eq!(store.search("q", 10).await.unwrap().len(), 3);
        assert_eq!(store.search("q", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_vector_chunks_rank_last() {
        let provider = Arc::new(
            StubEmbeddings::new(2)
                .with_vector("degenerate", vec![0.0, 0.0])
                .with_vector("normal", vec![1.0, 1.0])
                .with_vector("q", vec![1.0, 0.5]),
        );
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, provider);

        store
            .add_chunks(&[chunk("degenerate", "doc.md", 0), chunk("normal", "doc.md", 1)])
            .await
            .unwrap();

        let results = store.search("q", 0).await.unwrap();
        assert_eq!(results[0].text, "normal");
        assert_eq!(results[1].text, "degenerate");
    }

    #[tokio::test]
    async fn reingestion_replaces_chunks_from_the_same_source() {
        let provider = Arc::new(StubEmbeddings::new(2));
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, provider);

        store
            .add_chunks(&[chunk("v1 part 1", "guide.md", 0), chunk("v1 part 2", "guide.md", 1)])
            .await
            .unwrap();
        store
            .add_chunks(&[chunk("other doc", "other.md", 0)])
            .await
            .unwrap();
        store
            .add_chunks(&[chunk("v2 all in one", "guide.md", 0)])
            .await
            .unwrap();

        assert_eq!(store.chunk_count().await, 2);
        let results = store.search("v2", 0).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|c| c.text.as_str()).collect();
        assert!(texts.contains(&"v2 all in one"));
        assert!(texts.contains(&"other doc"));
        assert!(!texts.contains(&"v1 part 1"));
    }

    #[tokio::test]
    async fn provider_failure_keeps_already_embedded_chunks() {
        let provider = Arc::new(StubEmbeddings::new(2).failing_on("bad"));
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, provider);

        let err = store
            .add_chunks(&[chunk("good", "doc.md", 0), chunk("bad", "doc.md", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Upstream { .. }));
        assert_eq!(store.chunk_count().await, 1);
    }

    #[tokio::test]
    async fn wrong_dimension_embeddings_are_rejected() {
        let provider = Arc::new(StubEmbeddings::new(3).with_vector("short", vec![1.0]));
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, provider);

        let err = store
            .add_chunks(&[chunk("short", "doc.md", 0)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(StubEmbeddings::new(2));

        let store = store_at(&dir, Arc::clone(&provider));
        store
            .add_chunks(&[chunk("persisted", "doc.md", 0)])
            .await
            .unwrap();
        store.save().await.unwrap();

        let reloaded = store_at(&dir, provider);
        reloaded.load().await;
        assert_eq!(reloaded.chunk_count().await, 1);

        let results = reloaded.search("persisted", 1).await.unwrap();
        assert_eq!(results[0].text, "persisted");
        assert_eq!(results[0].id, "doc.md-chunk-0");
    }

    #[tokio::test]
    async fn missing_and_corrupt_snapshots_load_as_empty() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(StubEmbeddings::new(2));

        let store = store_at(&dir, Arc::clone(&provider));
        store.load().await;
        assert_eq!(store.chunk_count().await, 0);

        std::fs::write(dir.path().join("store.json"), "{ not json").unwrap();
        store.load().await;
        assert_eq!(store.chunk_count().await, 0);
    }

    #[tokio::test]
    async fn snapshot_for_a_different_model_is_ignored() {
        let dir = TempDir::new().unwrap();

        let writer = store_at(&dir, Arc::new(StubEmbeddings::new(2)));
        writer.add_chunks(&[chunk("text", "doc.md", 0)]).await.unwrap();
        writer.save().await.unwrap();

        let mut other = StubEmbeddings::new(2);
        other.model = "different-model".to_string();
        let reader = store_at(&dir, Arc::new(other));
        reader.load().await;
        assert_eq!(reader.chunk_count().await, 0);
    }

    #[tokio::test]
    async fn reload_if_changed_detects_external_writes() {
        let dir = TempDir::new().unwrap();

        let first = store_at(&dir, Arc::new(StubEmbeddings::new(2)));
        first.load().await;
        assert!(!first.reload_if_changed().await);

        // Second instance sharing the same snapshot writes to it.
        let second = store_at(&dir, Arc::new(StubEmbeddings::new(2)));
        second
            .add_chunks(&[chunk("written elsewhere", "doc.md", 0)])
            .await
            .unwrap();
        second.save().await.unwrap();

        assert!(first.reload_if_changed().await);
        assert_eq!(first.chunk_count().await, 1);
        assert!(!first.reload_if_changed().await);
    }

    #[tokio::test]
    async fn clear_all_reports_removed_count_without_touching_disk() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, Arc::new(StubEmbeddings::new(2)));

        store
            .add_chunks(&[chunk("a", "doc.md", 0), chunk("b", "doc.md", 1)])
            .await
            .unwrap();
        store.save().await.unwrap();

        assert_eq!(store.clear_all().await, 2);
        assert_eq!(store.chunk_count().await, 0);
        // Snapshot still holds the chunks until the next save.
        assert!(store.snapshot_path().exists());
    }

    #[test]
    fn snapshot_records_flatten_chunk_fields() {
        let stored = StoredChunk {
            chunk: chunk("body", "doc.md", 0),
            embedding: vec![0.5, 0.5],
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["id"], "doc.md-chunk-0");
        assert_eq!(json["text"], "body");
        assert_eq!(json["metadata"]["source"], "doc.md");
        assert!(json["embedding"].is_array());
    }
}
