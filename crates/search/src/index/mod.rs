//! In-memory semantic index over the uploaded document
//!
//! Each upload builds a fresh immutable [`IndexSnapshot`] which replaces the
//! previous one in a single swap. Readers clone the `Arc` and release the
//! lock before doing any work.

mod chunker;

pub use chunker::{ChunkingConfig, PageChunk, PageChunker};

use routeforge_common::config::DocumentConfig;
use routeforge_common::embeddings::cosine_similarity;
use routeforge_common::errors::{AppError, Result};
use routeforge_common::Embedder;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// Summary of one indexing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// SHA-256 fingerprint of the page texts
    pub document_id: String,
    pub source: String,
    pub pages: usize,
    pub chunks: usize,
}

/// An embedded chunk
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: PageChunk,
    pub embedding: Vec<f32>,
}

/// Immutable view of the indexed document
#[derive(Debug)]
pub struct IndexSnapshot {
    document_id: String,
    chunks: Vec<IndexedChunk>,
}

impl IndexSnapshot {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Top `k` chunks by cosine similarity, descending; ties keep insertion order
    pub fn nearest_neighbors(&self, query_vector: &[f32], k: usize) -> Vec<&PageChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i, cosine_similarity(query_vector, &c.embedding)))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(k)
            .map(|(i, _)| &self.chunks[i].chunk)
            .collect()
    }

    /// All chunks of page `page` (1-based), in insertion order
    pub fn content_on_page(&self, page: usize) -> Vec<&PageChunk> {
        self.chunks
            .iter()
            .map(|c| &c.chunk)
            .filter(|c| c.page == page)
            .collect()
    }
}

/// Fingerprint of the page texts
fn fingerprint(pages: &[String]) -> String {
    let mut hasher = Sha256::new();
    for page in pages {
        hasher.update(page.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Copy-on-write document index
pub struct DocumentIndex {
    embedder: Arc<dyn Embedder>,
    chunker: PageChunker,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl DocumentIndex {
    pub fn new(embedder: Arc<dyn Embedder>, chunking: &ChunkingConfig) -> Result<Self> {
        Ok(Self {
            embedder,
            chunker: PageChunker::new(chunking)?,
            snapshot: RwLock::new(None),
        })
    }

    pub fn from_config(embedder: Arc<dyn Embedder>, config: &DocumentConfig) -> Result<Self> {
        Self::new(
            embedder,
            &ChunkingConfig {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
            },
        )
    }

    /// Embedder used for both chunks and queries
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Current snapshot, if a document has been indexed
    pub async fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Chunk, embed, and swap in a new snapshot
    ///
    /// On any error the previous snapshot stays in place.
    #[instrument(skip(self, pages), fields(pages = pages.len()))]
    pub async fn index_document(&self, source: &str, pages: Vec<String>) -> Result<IndexReport> {
        let chunks = self.chunker.chunk_pages(source, &pages);
        if chunks.is_empty() {
            return Err(AppError::Validation {
                message: "Document contains no extractable text".to_string(),
                field: Some("pages".to_string()),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(AppError::Indexing {
                message: format!(
                    "Embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        let document_id = fingerprint(&pages);
        let report = IndexReport {
            document_id: document_id.clone(),
            source: source.to_string(),
            pages: pages.len(),
            chunks: chunks.len(),
        };

        let snapshot = IndexSnapshot {
            document_id,
            chunks: chunks
                .into_iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
                .collect(),
        };

        *self.snapshot.write().await = Some(Arc::new(snapshot));

        routeforge_common::metrics::record_document_indexed(report.chunks);
        info!(
            document_id = %report.document_id,
            source = %report.source,
            chunks = report.chunks,
            model = self.embedder.model_name(),
            "Document indexed"
        );

        Ok(report)
    }
}
