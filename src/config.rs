//! Configuration for the RAG pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters carried between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to retrieve for a query.
    pub top_k: usize,
    /// Minimum similarity score for retrieved results (results below this
    /// are filtered out). 0.0 disables filtering.
    pub similarity_threshold: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self { chunk_size: 800, chunk_overlap: 120, top_k: 8, similarity_threshold: 0.0 }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build a config from environment variables, falling back to defaults.
    ///
    /// Reads `KB_CHUNK_SIZE`, `KB_CHUNK_OVERLAP`, and `KB_TOP_K`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a variable is set but not a valid
    /// number, or if the resulting parameters are inconsistent.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(size) = read_env_usize("KB_CHUNK_SIZE")? {
            builder = builder.chunk_size(size);
        }
        if let Some(overlap) = read_env_usize("KB_CHUNK_OVERLAP")? {
            builder = builder.chunk_overlap(overlap);
        }
        if let Some(k) = read_env_usize("KB_TOP_K")? {
            builder = builder.top_k(k);
        }
        builder.build()
    }
}

fn read_env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| RagError::Config(format!("{name} must be a non-negative integer, got '{raw}'"))),
        Err(_) => Ok(None),
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to retrieve for a query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    pub fn build(self) -> Result<RagConfig> {
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}
