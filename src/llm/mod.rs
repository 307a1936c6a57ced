//! Model collaborators.
//!
//! The engine talks to embedding and generation models only through the
//! traits in [`provider`]; [`ollama`] supplies the reference HTTP
//! implementations and [`prompt`] builds the grounded RAG prompt.

pub mod ollama;
pub mod prompt;
pub mod provider;

pub use ollama::{OllamaEmbeddingProvider, OllamaGenerationProvider};
pub use prompt::PromptBuilder;
pub use provider::{EmbeddingProvider, GenerationProvider};
