//! RAG pipeline orchestrator.
//!
//! [`RagPipeline`] composes an [`EmbeddingProvider`], a [`VectorStore`], a
//! [`Chunker`], a [`PromptBuilder`], and a [`GenerationClient`] into the
//! two top-level flows: ingestion (load → chunk → embed → upsert) and
//! answering (embed → retrieve → prompt → generate → cite).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kb_rag::{ChatClient, FileIndex, OpenAiEmbedder, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedder(Arc::new(OpenAiEmbedder::from_env()?))
//!     .store(Arc::new(FileIndex::open("storage/index.json").await?))
//!     .generator(Arc::new(ChatClient::groq(groq_key)?))
//!     .build()?;
//!
//! pipeline.ingest(&kb_rag::load_path("data/report.pdf")?).await?;
//! let result = pipeline.answer("What changed in Q3?", None).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::chunking::{Chunker, SentenceChunker};
use crate::citation::resolve_citations;
use crate::config::RagConfig;
use crate::document::{Chunk, Document, DocumentInfo, QueryResult, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationClient;
use crate::prompt::PromptBuilder;
use crate::vectorstore::VectorStore;

/// A per-document ingestion failure inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFailure {
    /// The document that failed to ingest.
    pub document: String,
    /// The failure, rendered for reporting.
    pub error: String,
}

/// Outcome of a batch ingest or rebuild: per-document failures do not
/// abort the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Documents ingested successfully.
    pub ingested: Vec<String>,
    /// Documents that failed, with the failure kind.
    pub failed: Vec<DocumentFailure>,
    /// Total chunks added across all ingested documents.
    pub chunks_added: usize,
}

/// The RAG pipeline orchestrator.
///
/// All components are shared read-only; the vector store is the only
/// shared mutable resource and manages its own synchronization, so
/// ingestion and queries may run concurrently. Construct via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    prompt_builder: PromptBuilder,
    generator: Arc<dyn GenerationClient>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Ingest a single document: chunk → embed → upsert.
    ///
    /// The document's chunk set is upserted as a unit, replacing any prior
    /// entries for the same document id. Returns the stored chunks with
    /// embeddings attached.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyDocument`] if the document has no extractable text
    /// - [`RagError::EmbeddingUnavailable`] if embedding fails
    /// - [`RagError::Index`] if storage fails
    pub async fn ingest(&self, document: &Document) -> Result<Vec<Chunk>> {
        let mut chunks = self.chunker.chunk(document).inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "chunking failed");
        })?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await.inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
        })?;

        if embeddings.len() != chunks.len() {
            return Err(RagError::Pipeline(format!(
                "embedder returned {} vectors for {} chunks of document '{}'",
                embeddings.len(),
                chunks.len(),
                document.id
            )));
        }

        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        let page_count = document.pages.len();
        self.store.upsert_document(&document.id, page_count, chunks.clone()).await.inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "upsert failed during ingestion");
        })?;

        info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
        Ok(chunks)
    }

    /// Ingest multiple documents with partial-failure semantics: a failing
    /// document is reported and the batch continues.
    pub async fn ingest_batch(&self, documents: &[Document]) -> IngestReport {
        let mut report = IngestReport::default();

        for document in documents {
            match self.ingest(document).await {
                Ok(chunks) => {
                    report.chunks_added += chunks.len();
                    report.ingested.push(document.id.clone());
                }
                Err(e) => {
                    warn!(document.id = %document.id, error = %e, "skipping document in batch");
                    report
                        .failed
                        .push(DocumentFailure { document: document.id.clone(), error: e.to_string() });
                }
            }
        }

        info!(
            ingested = report.ingested.len(),
            failed = report.failed.len(),
            chunks_added = report.chunks_added,
            "batch ingest complete"
        );
        report
    }

    /// Rebuild the collection: delete everything, then re-ingest the given
    /// documents with partial-failure semantics.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Index`] if clearing the store fails.
    pub async fn rebuild(&self, documents: &[Document]) -> Result<IngestReport> {
        self.store.clear().await?;
        info!(document_count = documents.len(), "index cleared for rebuild");
        Ok(self.ingest_batch(documents).await)
    }

    /// Remove all entries for a document.
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        self.store.delete_document(document_id).await
    }

    /// Retrieve the top-k chunks for a question.
    ///
    /// `k` falls back to the configured `top_k`. An empty index yields an
    /// empty result, not an error; results below the configured
    /// similarity threshold are filtered out.
    pub async fn retrieve(&self, question: &str, k: Option<usize>) -> Result<Vec<SearchResult>> {
        if self.store.len().await? == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(question).await.inspect_err(|e| {
            error!(error = %e, "embedding failed during query");
        })?;

        let k = k.unwrap_or(self.config.top_k);
        let results = self.store.query(&query_embedding, k).await?;

        let threshold = self.config.similarity_threshold;
        let filtered: Vec<SearchResult> =
            results.into_iter().filter(|r| r.score >= threshold).collect();

        info!(result_count = filtered.len(), k, "retrieval completed");
        Ok(filtered)
    }

    /// Answer a question grounded in the indexed documents.
    ///
    /// Retrieves the top-k chunks, builds a grounded prompt (with the
    /// explicit no-context instruction when nothing was retrieved), calls
    /// the generation backend, and attaches citations for exactly the
    /// chunks included in the prompt.
    ///
    /// # Errors
    ///
    /// Failures in embedding, storage, or generation are terminal for the
    /// request and carry their failure kind; no partial answer is
    /// returned.
    pub async fn answer(&self, question: &str, k: Option<usize>) -> Result<QueryResult> {
        let context = self.retrieve(question, k).await?;
        let prompt = self.prompt_builder.build(question, &context);

        let answer = self.generator.generate(&prompt).await.inspect_err(|e| {
            error!(error = %e, "generation failed");
        })?;

        let citations = resolve_citations(&context);
        info!(chunks_used = context.len(), citation_count = citations.len(), "answered question");

        Ok(QueryResult { answer, chunks: context, citations })
    }

    /// List distinct indexed documents with their page counts.
    pub async fn documents(&self) -> Result<Vec<DocumentInfo>> {
        self.store.documents().await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedder`, `store`, and `generator` are required. `config` defaults to
/// [`RagConfig::default()`]; the chunker defaults to a [`SentenceChunker`]
/// derived from the config; the prompt builder defaults to the standard
/// grounded instructions.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    prompt_builder: Option<PromptBuilder>,
    generator: Option<Arc<dyn GenerationClient>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector store backend.
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Override the prompt builder.
    pub fn prompt_builder(mut self, prompt_builder: PromptBuilder) -> Self {
        self.prompt_builder = Some(prompt_builder);
        self
    }

    /// Set the generation backend.
    pub fn generator(mut self, generator: Arc<dyn GenerationClient>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`RagPipeline`], validating that all required components
    /// are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required component is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedder =
            self.embedder.ok_or_else(|| RagError::Config("embedder is required".to_string()))?;
        let store = self.store.ok_or_else(|| RagError::Config("store is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(SentenceChunker::new(config.chunk_size, config.chunk_overlap))
        });
        let prompt_builder = self.prompt_builder.unwrap_or_default();

        Ok(RagPipeline { config, embedder, store, chunker, prompt_builder, generator })
    }
}
