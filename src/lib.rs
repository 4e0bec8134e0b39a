//! # kb-rag
//!
//! Retrieval-augmented generation core: ingest unstructured documents,
//! index them for semantic retrieval, and answer natural-language
//! questions grounded exclusively in retrieved passages, with
//! source/page citations.
//!
//! The crate is organized as one module per pipeline stage:
//!
//! - [`loader`] — format-specific text extraction with page provenance
//! - [`chunking`] — overlapping chunks at paragraph/sentence boundaries
//! - [`embedding`] / [`openai_embed`] — text → fixed-size dense vectors
//! - [`vectorstore`] / [`index`] — durable nearest-neighbor index
//! - [`prompt`] — grounded prompt construction with tagged context
//! - [`generation`] — provider-agnostic chat backends with bounded retry
//! - [`citation`] — (document, page) provenance for answers
//! - [`pipeline`] — the orchestrator tying the stages together
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kb_rag::{ChatClient, FileIndex, OpenAiEmbedder, RagConfig, RagPipeline};
//!
//! # async fn run() -> kb_rag::Result<()> {
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::from_env()?)
//!     .embedder(Arc::new(OpenAiEmbedder::from_env()?))
//!     .store(Arc::new(FileIndex::open("storage/index.json").await?))
//!     .generator(Arc::new(ChatClient::openai(std::env::var("OPENAI_API_KEY").unwrap())?))
//!     .build()?;
//!
//! pipeline.ingest(&kb_rag::load_path("data/handbook.pdf")?).await?;
//!
//! let result = pipeline.answer("What is the refund policy?", None).await?;
//! println!("{}", result.answer);
//! for citation in &result.citations {
//!     println!("  — {} p.{}", citation.document, citation.page);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod citation;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod loader;
pub mod openai_embed;
pub mod pipeline;
pub mod prompt;
pub mod vectorstore;

pub use chunking::{Chunker, SentenceChunker};
pub use citation::resolve_citations;
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Chunk, Citation, Document, DocumentInfo, Page, QueryResult, SearchResult,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::{ChatClient, GenerationClient, RetryPolicy};
pub use index::FileIndex;
pub use loader::load_path;
pub use openai_embed::OpenAiEmbedder;
pub use pipeline::{DocumentFailure, IngestReport, RagPipeline, RagPipelineBuilder};
pub use prompt::{Prompt, PromptBuilder};
pub use vectorstore::VectorStore;
