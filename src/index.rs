//! File-backed vector index using cosine similarity.
//!
//! [`FileIndex`] holds the collection in memory under a
//! `tokio::sync::RwLock` and persists a JSON snapshot after every write,
//! so the index survives process restarts without re-embedding. Writes go
//! to a temporary file first and are renamed into place, keeping the
//! snapshot intact if the process dies mid-write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::{Chunk, DocumentInfo, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Index state, doubling as the on-disk snapshot format: the entries in
/// insertion order plus each document's page count at load time.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    entries: Vec<Chunk>,
    #[serde(default)]
    page_counts: BTreeMap<String, usize>,
}

/// A durable, single-collection vector index.
///
/// Entries are kept in insertion order; searches use cosine similarity
/// with a stable sort, so equal scores rank by insertion order. All
/// operations are async-safe via `tokio::sync::RwLock`: queries run
/// concurrently while a document upsert replaces that document's entries
/// in one write critical section.
pub struct FileIndex {
    path: Option<PathBuf>,
    state: RwLock<Snapshot>,
}

impl FileIndex {
    /// Open an index backed by the given snapshot path, loading existing
    /// entries if the file exists.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Index`] if an existing snapshot cannot be read
    /// or parsed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    RagError::Index(format!("corrupt snapshot at {}: {e}", path.display()))
                })?;
                info!(
                    path = %path.display(),
                    entry_count = snapshot.entries.len(),
                    "loaded index snapshot"
                );
                snapshot
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => {
                return Err(RagError::Index(format!(
                    "failed to read snapshot at {}: {e}",
                    path.display()
                )));
            }
        };

        Ok(Self { path: Some(path), state: RwLock::new(state) })
    }

    /// Create an index with no persistence. Intended for tests and
    /// short-lived tooling.
    pub fn in_memory() -> Self {
        Self { path: None, state: RwLock::new(Snapshot::default()) }
    }

    /// Write the snapshot to disk via a temporary file and atomic rename.
    /// Callers must hold the write lock.
    async fn persist(&self, state: &Snapshot) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RagError::Index(format!("failed to create {}: {e}", parent.display())))?;
        }

        let json = serde_json::to_vec(state)
            .map_err(|e| RagError::Index(format!("failed to serialize snapshot: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| RagError::Index(format!("failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| RagError::Index(format!("failed to replace snapshot: {e}")))?;

        debug!(path = %path.display(), entry_count = state.entries.len(), "persisted index snapshot");
        Ok(())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the dimensions
/// differ.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for FileIndex {
    async fn upsert_document(
        &self,
        document_id: &str,
        page_count: usize,
        chunks: Vec<Chunk>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.entries.retain(|c| c.document_id != document_id);
        state.entries.extend(chunks);
        state.page_counts.insert(document_id.to_string(), page_count);
        self.persist(&state).await
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|c| c.document_id != document_id);
        state.page_counts.remove(document_id);
        if state.entries.len() != before {
            debug!(
                document.id = document_id,
                removed = before - state.entries.len(),
                "deleted document entries"
            );
        }
        self.persist(&state).await
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.page_counts.clear();
        self.persist(&state).await
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let state = self.state.read().await;

        let mut scored: Vec<SearchResult> = state
            .entries
            .iter()
            .map(|chunk| SearchResult {
                chunk: chunk.clone(),
                score: cosine_similarity(&chunk.embedding, embedding),
            })
            .collect();

        // Stable sort: ties keep insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn documents(&self) -> Result<Vec<DocumentInfo>> {
        let state = self.state.read().await;
        Ok(state
            .page_counts
            .iter()
            .map(|(document, pages)| DocumentInfo { document: document.clone(), pages: *pages })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.state.read().await.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_handles_zero_and_mismatched_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
