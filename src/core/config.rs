//! Engine configuration.
//!
//! All knobs live in a single `RagConfig` loaded from a TOML file. A missing
//! file is not an error: the engine runs on defaults, which match the
//! reference deployment (local Ollama, 1000-char chunks, 200-char overlap).

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::errors::RagError;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RagConfig {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub query_cache: CacheConfig,
    pub embedding_cache: CacheConfig,
    pub ollama: OllamaConfig,
    /// Snapshot file for the vector store.
    pub store_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub max_chunk_size: usize,
    /// Overlap between consecutive windows of an oversized section.
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question. 0 means "no limit".
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OllamaConfig {
    pub base_url: String,
    pub generation_model: String,
    pub embedding_model: String,
    /// Dimension of the embedding model's output vectors.
    pub embedding_dimensions: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            query_cache: CacheConfig {
                max_entries: 100,
                ttl_secs: 30 * 60,
            },
            // Embeddings are deterministic, so they tolerate more entries
            // and a longer lifetime than cached answers.
            embedding_cache: CacheConfig {
                max_entries: 500,
                ttl_secs: 60 * 60,
            },
            ollama: OllamaConfig::default(),
            store_path: PathBuf::from("vector-store.json"),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl_secs: 30 * 60,
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string()),
            generation_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimensions: 768,
        }
    }
}

impl RagConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist. A file that exists but fails to parse is a
    /// hard error.
    pub fn load(path: &Path) -> Result<Self, RagError> {
        if !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| RagError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}
