//! Text chunking module
//!
//! Splits page text into overlapping chunks for embedding.

use routeforge_common::errors::{AppError, Result};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 150,
        }
    }
}

/// A chunk of one page with its attribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    /// The chunk content
    pub text: String,
    /// Source document name
    pub source: String,
    /// 1-based page number
    pub page: usize,
}

/// Splits pages into attributed chunks
pub struct PageChunker {
    splitter: TextSplitter<text_splitter::Characters>,
    chunk_size: usize,
}

impl PageChunker {
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        let chunk_config = ChunkConfig::new(config.chunk_size)
            .with_overlap(config.chunk_overlap)
            .map_err(|e| AppError::Configuration {
                message: format!("Invalid chunking configuration: {}", e),
            })?;

        Ok(Self {
            splitter: TextSplitter::new(chunk_config),
            chunk_size: config.chunk_size,
        })
    }

    /// Chunk every non-blank page, keeping page order then chunk order
    pub fn chunk_pages(&self, source: &str, pages: &[String]) -> Vec<PageChunk> {
        let mut chunks = Vec::new();

        for (index, page_text) in pages.iter().enumerate() {
            if page_text.trim().is_empty() {
                continue;
            }

            let before = chunks.len();
            chunks.extend(self.splitter.chunks(page_text).map(|text| PageChunk {
                text: text.to_string(),
                source: source.to_string(),
                page: index + 1,
            }));

            debug!(
                page = index + 1,
                input_len = page_text.len(),
                chunk_count = chunks.len() - before,
                chunk_size = self.chunk_size,
                "Page chunked"
            );
        }

        chunks
    }
}
