//! Semantic search over the uploaded document

use super::{failed, RetrievalBackend};
use crate::index::{DocumentIndex, PageChunk};
use async_trait::async_trait;
use routeforge_common::config::DocumentConfig;
use routeforge_common::{BackendKind, SearchOutcome};
use std::sync::Arc;
use tracing::{info, warn};

/// Returned as content when nothing has been indexed yet
pub const NO_DOCUMENTS_MESSAGE: &str = "No documents have been uploaded.";

/// Queries asking for the gist of the document; these read the first page
pub const SUMMARY_KEYWORDS: &[&str] = &[
    "summarize",
    "summary",
    "overview",
    "abstract",
    "what is this about",
    "what is this document about",
    "what is the pdf about",
];

/// Document retrieval backend
pub struct DocumentStore {
    index: Arc<DocumentIndex>,
    specific_k: usize,
    summary_fallback_k: usize,
}

impl DocumentStore {
    pub fn new(index: Arc<DocumentIndex>, specific_k: usize, summary_fallback_k: usize) -> Self {
        Self {
            index,
            specific_k,
            summary_fallback_k,
        }
    }

    pub fn from_config(index: Arc<DocumentIndex>, config: &DocumentConfig) -> Self {
        Self::new(index, config.specific_k, config.summary_fallback_k)
    }

    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.index
    }
}

fn render_chunks(chunks: &[&PageChunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("--- Context from {} (Page {}) ---\n{}", c.source, c.page, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl RetrievalBackend for DocumentStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    async fn search(&self, query: &str) -> SearchOutcome {
        let Some(snapshot) = self.index.snapshot().await else {
            warn!("Document search requested before any upload");
            return SearchOutcome::Found(NO_DOCUMENTS_MESSAGE.to_string());
        };

        let lowered = query.to_lowercase();
        let summary = SUMMARY_KEYWORDS.iter().any(|kw| lowered.contains(kw));

        let mut chunks = if summary {
            info!("Summary query, reading the first page");
            snapshot.content_on_page(1)
        } else {
            Vec::new()
        };

        if chunks.is_empty() {
            let k = if summary { self.summary_fallback_k } else { self.specific_k };
            let query_vector = match self.index.embedder().embed(query).await {
                Ok(vector) => vector,
                Err(e) => return failed(BackendKind::Document, &e),
            };
            chunks = snapshot.nearest_neighbors(&query_vector, k);
        }

        if chunks.is_empty() {
            warn!("No relevant document chunks found");
            return SearchOutcome::Empty;
        }

        let context = render_chunks(&chunks);
        info!(chunks = chunks.len(), chars = context.len(), "Document context retrieved");
        SearchOutcome::Found(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ChunkingConfig;
    use async_trait::async_trait;
    use routeforge_common::embeddings::HashingEmbedder;
    use routeforge_common::errors::{AppError, Result};
    use routeforge_common::Embedder;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn store(embedder: Arc<dyn Embedder>) -> DocumentStore {
        let index = DocumentIndex::new(embedder, &ChunkingConfig::default()).unwrap();
        DocumentStore::new(Arc::new(index), 5, 3)
    }

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    /// Indexes normally, then fails query embeddings once armed
    struct FlakyEmbedder {
        inner: HashingEmbedder,
        failing: AtomicBool,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(AppError::EmbeddingError {
                    message: "service unavailable".into(),
                });
            }
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.inner.embed_batch(texts).await
        }

        fn model_name(&self) -> &str {
            "flaky"
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    #[tokio::test]
    async fn test_no_upload_is_descriptive_content() {
        let store = store(Arc::new(HashingEmbedder::new(32)));
        assert_eq!(
            store.search("what does section 2 say").await,
            SearchOutcome::Found(NO_DOCUMENTS_MESSAGE.to_string())
        );
    }

    #[tokio::test]
    async fn test_summary_query_reads_first_page() {
        let store = store(Arc::new(HashingEmbedder::new(32)));
        store
            .index()
            .index_document("report.pdf", pages(&["Executive overview.", "Appendix tables."]))
            .await
            .unwrap();

        let outcome = store.search("Please SUMMARIZE the report").await;
        assert_eq!(
            outcome,
            SearchOutcome::Found(
                "--- Context from report.pdf (Page 1) ---\nExecutive overview.".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_summary_without_first_page_uses_similarity() {
        let store = store(Arc::new(HashingEmbedder::new(32)));
        store
            .index()
            .index_document("scan.pdf", pages(&["", "a", "b", "c", "d"]))
            .await
            .unwrap();

        let SearchOutcome::Found(text) = store.search("give me an overview").await else {
            panic!("expected found");
        };
        assert_eq!(text.matches("--- Context from").count(), 3);
        assert!(!text.contains("(Page 1)"));
    }

    #[tokio::test]
    async fn test_specific_query_returns_top_five() {
        let store = store(Arc::new(HashingEmbedder::new(32)));
        let texts: Vec<String> = (0..8).map(|i| format!("Section {} details.", i)).collect();
        store.index().index_document("long.pdf", texts).await.unwrap();

        let SearchOutcome::Found(text) = store.search("section details").await else {
            panic!("expected found");
        };
        assert_eq!(text.split("\n\n--- Context").count(), 5);
    }

    #[tokio::test]
    async fn test_query_embedding_failure_is_failed() {
        let embedder = Arc::new(FlakyEmbedder {
            inner: HashingEmbedder::new(32),
            failing: AtomicBool::new(false),
        });
        let store = store(embedder.clone());
        store
            .index()
            .index_document("doc.pdf", pages(&["Some text."]))
            .await
            .unwrap();

        embedder.failing.store(true, Ordering::SeqCst);
        assert!(store.search("which method was used").await.is_failed());
    }
}
