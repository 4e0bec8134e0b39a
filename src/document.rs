//! Data types for documents, chunks, search results, and answers.

use serde::{Deserialize, Serialize};

/// A single page of extracted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    /// 1-based page number within the source document.
    pub number: u32,
    /// Normalized text content of the page.
    pub text: String,
}

/// A source document: an ordered sequence of pages.
///
/// Identity is the source filename. Documents are immutable after load;
/// re-ingesting under the same id replaces all prior index entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document (source filename).
    pub id: String,
    /// Ordered pages with their extracted text.
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a document from pre-paginated text.
    pub fn from_pages(id: impl Into<String>, pages: Vec<Page>) -> Self {
        Self { id: id.into(), pages }
    }

    /// Create a single-page document from raw text.
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), pages: vec![Page { number: 1, text: text.into() }] }
    }

    /// True if no page contains any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

/// A bounded span of document text used as a retrieval unit.
///
/// Chunk ids are generated as `{document_id}#{seq}`, so re-ingesting a
/// document produces the same key space and replaces prior entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk within the collection.
    pub id: String,
    /// The id of the parent [`Document`].
    pub document_id: String,
    /// Page number where the chunk's first character originates.
    pub page: u32,
    /// Sequence index of the chunk within its document.
    pub seq: usize,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text. Empty until the
    /// pipeline attaches it before upsert.
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub(crate) fn new(document_id: &str, page: u32, seq: usize, text: String) -> Self {
        Self {
            id: format!("{document_id}#{seq}"),
            document_id: document_id.to_string(),
            page,
            seq,
            text,
            embedding: Vec::new(),
        }
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// A (document, page) provenance reference attached to an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Citation {
    /// Source document id.
    pub document: String,
    /// Page number within the source document.
    pub page: u32,
}

/// The outcome of answering a question: the generated answer, the chunks
/// that grounded it (by descending relevance), and their citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// The generated answer text.
    pub answer: String,
    /// The retrieved chunks included in the grounding context, most
    /// relevant first.
    pub chunks: Vec<SearchResult>,
    /// Deduplicated citations in first-appearance order among the chunks.
    pub citations: Vec<Citation>,
}

impl QueryResult {
    /// Number of chunks included in the grounding context.
    pub fn chunks_used(&self) -> usize {
        self.chunks.len()
    }
}

/// An indexed document and its page count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentInfo {
    /// Source document id.
    pub document: String,
    /// Number of pages the document had when it was loaded.
    pub pages: usize,
}
