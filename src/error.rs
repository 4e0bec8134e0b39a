//! Error types for the `kb-rag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A source file could not be read or has an unsupported format.
    #[error("Load error ({source_id}): {message}")]
    Load {
        /// The document or path that failed to load.
        source_id: String,
        /// A description of the failure.
        message: String,
    },

    /// A document yielded no extractable text.
    #[error("Document '{0}' has no extractable text")]
    EmptyDocument(String),

    /// The embedding backend could not be reached or failed to produce vectors.
    #[error("Embedding unavailable ({provider}): {message}")]
    EmbeddingUnavailable {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A storage read or write in the vector index failed.
    #[error("Index error: {0}")]
    Index(String),

    /// The generation backend failed on auth, quota, or after retries were exhausted.
    #[error("Generation unavailable ({provider}): {message}")]
    GenerationUnavailable {
        /// The generation backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error in the pipeline orchestration, wrapping the stage that failed.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
