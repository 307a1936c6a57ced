use thiserror::Error;

/// Error taxonomy for the retrieval engine.
///
/// Collaborator failures surface as [`RagError::Upstream`] and are never
/// swallowed by the cache or store layers. A missing or unreadable snapshot
/// is deliberately *not* represented here: `VectorStore::load` treats it as
/// a soft condition (empty store, logged).
#[derive(Debug, Error)]
pub enum RagError {
    /// An embedding or generation collaborator is unreachable or failed.
    #[error("upstream provider '{provider}' unavailable: {message}")]
    Upstream { provider: String, message: String },

    /// Answer generation failed. Distinct from the "no documentation"
    /// empty-result path, which is a successful response.
    #[error("failed to generate an answer: {0}")]
    Generation(String),

    /// An embedding did not match the dimension the store was built with.
    /// Mixing embedding models in one store is rejected outright.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RagError {
    pub fn upstream<E: std::fmt::Display>(provider: &str, err: E) -> Self {
        RagError::Upstream {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}
