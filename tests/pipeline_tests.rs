//! End-to-end pipeline behavior with mock embedding and generation
//! backends: retrieval grounding, citation correspondence, rebuild
//! semantics, and failure surfacing.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use kb_rag::{
    ChatClient, Chunk, Document, EmbeddingProvider, FileIndex, GenerationClient, Page, Prompt,
    RagConfig, RagError, RagPipeline, RetryPolicy, VectorStore,
};

const DIM: usize = 64;

/// Deterministic bag-of-words embedder: each word hashes to a dimension.
/// Texts sharing words score higher under cosine similarity.
struct WordHashEmbedder;

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    async fn embed(&self, text: &str) -> kb_rag::Result<Vec<f32>> {
        let mut vector = vec![0.0f32; DIM];
        for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() % DIM as u64) as usize] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// An embedder whose backend is unreachable.
struct UnavailableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnavailableEmbedder {
    async fn embed(&self, _text: &str) -> kb_rag::Result<Vec<f32>> {
        Err(RagError::EmbeddingUnavailable {
            provider: "mock".into(),
            message: "model could not be loaded".into(),
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Records every prompt it receives and returns a canned answer.
struct RecordingGenerator {
    prompts: Mutex<Vec<Prompt>>,
}

impl RecordingGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self { prompts: Mutex::new(Vec::new()) })
    }

    fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for RecordingGenerator {
    async fn generate(&self, prompt: &Prompt) -> kb_rag::Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        Ok("canned answer".to_string())
    }
}

fn pipeline_with(
    store: Arc<dyn VectorStore>,
    generator: Arc<RecordingGenerator>,
    config: RagConfig,
) -> RagPipeline {
    RagPipeline::builder()
        .config(config)
        .embedder(Arc::new(WordHashEmbedder))
        .store(store)
        .generator(generator)
        .build()
        .unwrap()
}

fn three_page_document() -> Document {
    Document::from_pages(
        "notes.pdf",
        vec![
            Page { number: 1, text: "Apples grow in the northern orchard.".into() },
            Page { number: 2, text: "The quantum flux capacitor hums quietly.".into() },
            Page { number: 3, text: "Rivers flow toward the southern delta.".into() },
        ],
    )
}

fn per_page_config() -> RagConfig {
    // Budget sized so each page's sentence lands in its own chunk.
    RagConfig::builder().chunk_size(45).chunk_overlap(0).top_k(8).build().unwrap()
}

#[tokio::test]
async fn phrase_unique_to_page_two_retrieves_page_two_first() {
    let generator = RecordingGenerator::new();
    let pipeline =
        pipeline_with(Arc::new(FileIndex::in_memory()), generator, per_page_config());

    let chunks = pipeline.ingest(&three_page_document()).await.unwrap();
    assert_eq!(chunks.len(), 3);

    let results = pipeline.retrieve("quantum flux capacitor", None).await.unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].chunk.page, 2);
}

#[tokio::test]
async fn answer_returns_citations_for_exactly_the_prompted_chunks() {
    let generator = RecordingGenerator::new();
    let pipeline =
        pipeline_with(Arc::new(FileIndex::in_memory()), generator.clone(), per_page_config());

    pipeline.ingest(&three_page_document()).await.unwrap();

    let result = pipeline.answer("Where do apples grow and rivers flow?", None).await.unwrap();
    assert_eq!(result.answer, "canned answer");
    assert_eq!(result.chunks_used(), result.chunks.len());
    assert!(!result.citations.is_empty());

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];

    // Every chunk reported as grounding context appears verbatim in the
    // prompt, and every citation maps to a tagged context block.
    for chunk in &result.chunks {
        assert!(prompt.user.contains(&chunk.chunk.text));
    }
    for citation in &result.citations {
        let tag = format!("{} p.{}", citation.document, citation.page);
        assert!(prompt.user.contains(&tag), "citation {tag} not present in prompt");
    }

    // And nothing fabricated: each citation's page matches a chunk used.
    for citation in &result.citations {
        assert!(result
            .chunks
            .iter()
            .any(|r| r.chunk.document_id == citation.document && r.chunk.page == citation.page));
    }
}

#[tokio::test]
async fn empty_index_answers_not_found_without_grounding_context() {
    let generator = RecordingGenerator::new();
    let pipeline = pipeline_with(
        Arc::new(FileIndex::in_memory()),
        generator.clone(),
        RagConfig::default(),
    );

    let result = pipeline.answer("anything at all?", None).await.unwrap();
    assert_eq!(result.chunks_used(), 0);
    assert!(result.citations.is_empty());

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].user.contains("No relevant context was found"));
    assert!(prompts[0].user.contains("no relevant information was found"));
}

#[tokio::test]
async fn reingesting_is_idempotent_on_entry_count() {
    let store = Arc::new(FileIndex::in_memory());
    let generator = RecordingGenerator::new();
    let pipeline = pipeline_with(store.clone(), generator, per_page_config());

    let document = three_page_document();
    pipeline.ingest(&document).await.unwrap();
    let count_after_first = store.len().await.unwrap();
    pipeline.ingest(&document).await.unwrap();
    assert_eq!(store.len().await.unwrap(), count_after_first);
}

#[tokio::test]
async fn batch_ingest_reports_per_document_failures_and_continues() {
    let generator = RecordingGenerator::new();
    let pipeline =
        pipeline_with(Arc::new(FileIndex::in_memory()), generator, per_page_config());

    let documents = vec![
        Document::from_text("good-one.txt", "A perfectly fine sentence."),
        Document::from_text("blank.txt", "   "),
        Document::from_text("good-two.txt", "Another fine sentence."),
    ];

    let report = pipeline.ingest_batch(&documents).await;
    assert_eq!(report.ingested, vec!["good-one.txt", "good-two.txt"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].document, "blank.txt");
    assert!(report.failed[0].error.contains("no extractable text"));
    assert_eq!(report.chunks_added, 2);
}

#[tokio::test]
async fn rebuild_with_zero_documents_leaves_empty_listing_and_not_found_answers() {
    let store = Arc::new(FileIndex::in_memory());
    let generator = RecordingGenerator::new();
    let pipeline = pipeline_with(store.clone(), generator.clone(), per_page_config());

    pipeline.ingest(&three_page_document()).await.unwrap();
    let report = pipeline.rebuild(&[]).await.unwrap();
    assert!(report.ingested.is_empty());
    assert_eq!(report.chunks_added, 0);

    assert!(pipeline.documents().await.unwrap().is_empty());

    let result = pipeline.answer("what do the notes say?", None).await.unwrap();
    assert!(result.citations.is_empty());
    assert_eq!(result.chunks_used(), 0);
    assert!(generator.prompts().last().unwrap().user.contains("No relevant context was found"));
}

#[tokio::test]
async fn rebuild_replaces_prior_collection() {
    let store = Arc::new(FileIndex::in_memory());
    let generator = RecordingGenerator::new();
    let pipeline = pipeline_with(store.clone(), generator, per_page_config());

    pipeline.ingest(&three_page_document()).await.unwrap();
    let replacement = Document::from_text("fresh.txt", "Entirely new material.");
    let report = pipeline.rebuild(std::slice::from_ref(&replacement)).await.unwrap();
    assert_eq!(report.ingested, vec!["fresh.txt"]);

    let listing = pipeline.documents().await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].document, "fresh.txt");
}

#[tokio::test]
async fn query_embedding_failure_surfaces_with_its_kind() {
    let store = Arc::new(FileIndex::in_memory());
    let generator = RecordingGenerator::new();

    // Ingest with a working embedder, then query through a pipeline whose
    // embedder is down.
    let working = pipeline_with(store.clone(), generator.clone(), per_page_config());
    working.ingest(&three_page_document()).await.unwrap();

    let broken = RagPipeline::builder()
        .config(per_page_config())
        .embedder(Arc::new(UnavailableEmbedder))
        .store(store)
        .generator(generator.clone())
        .build()
        .unwrap();

    let err = broken.answer("any question", None).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingUnavailable { .. }));
    // No partial answer: the generator was never called.
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn exhausted_transient_failures_surface_generation_unavailable() {
    // Nothing listens on the discard port, so every attempt fails with a
    // transport error, which the client treats as transient.
    let client = ChatClient::compatible("Test", "key", "http://127.0.0.1:9", "test-model")
        .unwrap()
        .with_retry(RetryPolicy { max_attempts: 3, initial_backoff: Duration::from_millis(1) });

    let prompt = Prompt { system: "system".into(), user: "user".into() };
    let err = client.generate(&prompt).await.unwrap_err();

    match err {
        RagError::GenerationUnavailable { provider, message } => {
            assert_eq!(provider, "Test");
            assert!(message.contains("3 attempts failed"), "unexpected message: {message}");
        }
        other => panic!("expected GenerationUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn listing_keeps_page_count_when_pages_merge_into_one_chunk() {
    let store = Arc::new(FileIndex::in_memory());
    let generator = RecordingGenerator::new();
    // Default budget: all three pages fit in a single chunk on page 1.
    let pipeline = pipeline_with(store, generator, RagConfig::default());

    let chunks = pipeline.ingest(&three_page_document()).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].page, 1);

    let listing = pipeline.documents().await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].document, "notes.pdf");
    assert_eq!(listing[0].pages, 3);
}

#[tokio::test]
async fn ingest_attaches_embeddings_before_storing() {
    let store = Arc::new(FileIndex::in_memory());
    let generator = RecordingGenerator::new();
    let pipeline = pipeline_with(store.clone(), generator, per_page_config());

    let chunks: Vec<Chunk> = pipeline.ingest(&three_page_document()).await.unwrap();
    for chunk in &chunks {
        assert_eq!(chunk.embedding.len(), DIM);
    }
}

#[tokio::test]
async fn loader_paginates_text_files_on_form_feeds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paged.txt");
    std::fs::write(&path, "First page text.\x0cSecond page text.").unwrap();

    let document = kb_rag::load_path(&path).unwrap();
    assert_eq!(document.id, "paged.txt");
    assert_eq!(document.pages.len(), 2);
    assert_eq!(document.pages[0].number, 1);
    assert_eq!(document.pages[1].number, 2);
    assert_eq!(document.pages[1].text, "Second page text.");
}
