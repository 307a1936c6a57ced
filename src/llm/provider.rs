use async_trait::async_trait;

use crate::core::errors::RagError;

/// Text → fixed-dimension vector collaborator.
///
/// Implementations must be deterministic for identical input (the embedding
/// caches rely on it) and must always return vectors of exactly
/// `dimensions()` length.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Output vector dimension. All embeddings sharing a vector store must
    /// agree on this.
    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Prompt → answer collaborator. Not required to be deterministic.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, RagError>;

    fn model_name(&self) -> &str;
}
