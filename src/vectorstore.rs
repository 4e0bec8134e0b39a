//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, DocumentInfo, SearchResult};
use crate::error::Result;

/// A storage backend for chunk embeddings with similarity search.
///
/// The store exclusively owns persisted chunks. Writes are keyed by
/// document: upserting a document atomically replaces all of its prior
/// entries as seen by concurrent readers — a query observes either the
/// pre-upsert or post-upsert state, never a mix. Entries are never edited
/// in place.
///
/// # Example
///
/// ```rust,ignore
/// use kb_rag::{FileIndex, VectorStore};
///
/// let index = FileIndex::open("storage/index.json").await?;
/// index.upsert_document("report.pdf", page_count, chunks).await?;
/// let results = index.query(&query_embedding, 8).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace all entries for a document. `page_count` is the
    /// number of pages the document had at load time, kept for the
    /// listing interface; chunks must have embeddings attached.
    async fn upsert_document(
        &self,
        document_id: &str,
        page_count: usize,
        chunks: Vec<Chunk>,
    ) -> Result<()>;

    /// Remove all entries for a document. No-op if the document is not
    /// indexed.
    async fn delete_document(&self, document_id: &str) -> Result<()>;

    /// Remove all entries from the collection. Used by rebuild.
    async fn clear(&self) -> Result<()>;

    /// Return the `k` entries most similar to the given embedding, ordered
    /// by descending similarity, ties broken by insertion order. Returns
    /// fewer than `k` when the collection holds fewer entries.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// List distinct indexed documents with the page counts they had at
    /// load time, sorted by document id.
    async fn documents(&self) -> Result<Vec<DocumentInfo>>;

    /// Number of entries in the collection.
    async fn len(&self) -> Result<usize>;
}
