//! RouteForge Common Library
//!
//! Shared code for the RouteForge crates including:
//! - Domain types exchanged between routing, retrieval, and synthesis
//! - Error types and handling
//! - Configuration management
//! - Embedding client abstraction
//! - Text generation client abstraction
//! - Metrics and observability

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::{CompletionRequest, TextGenerator};
pub use types::{AgentKind, AnswerResponse, BackendKind, Query, SearchOutcome};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default chat model used for routing and synthesis
pub const DEFAULT_GENERATION_MODEL: &str = "gemma2-9b-it";

/// Default embedding dimension for the hashing embedder
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
