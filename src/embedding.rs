//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that maps text to fixed-size dense vectors.
///
/// Implementations wrap a specific embedding backend behind a unified async
/// interface. Embeddings must be deterministic for a fixed model version:
/// the same text always maps to the same vector. The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) implementation calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends that support
/// native batching should override it for ingestion throughput.
///
/// The provider is constructed once at startup and shared read-only across
/// requests; failures surface as
/// [`RagError::EmbeddingUnavailable`](crate::RagError::EmbeddingUnavailable)
/// and are not retried.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}
