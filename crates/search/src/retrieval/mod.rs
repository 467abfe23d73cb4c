//! Retrieval backends
//!
//! Three variants share one contract:
//! - `Found(text)`: attributed context chunks
//! - `Empty`: the search ran and found nothing relevant
//! - `Failed(reason)`: the search mechanism failed (network, status, payload)
//!
//! Nothing raises past this boundary.

mod arxiv_feed;
mod document;
mod paper;
mod web;

pub use arxiv_feed::{parse_feed, PaperRecord};
pub use document::{DocumentStore, NO_DOCUMENTS_MESSAGE, SUMMARY_KEYWORDS};
pub use paper::{PaperSearch, NO_PAPERS_MESSAGE};
pub use web::{DuckDuckGoProvider, SerpApiProvider, WebHit, WebProvider, WebSearch};

use routeforge_common::errors::AppError;
use routeforge_common::{BackendKind, SearchOutcome};
use std::time::Duration;

/// Common trait for all retrieval backends
#[async_trait::async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Which variant this is
    fn kind(&self) -> BackendKind;

    /// Search for context relevant to the query
    async fn search(&self, query: &str) -> SearchOutcome;
}

/// Convert a failure into the `Failed` outcome, logging it once
pub(crate) fn failed(kind: BackendKind, err: &AppError) -> SearchOutcome {
    tracing::error!(backend = %kind, error = %err, code = ?err.code(), "Search mechanism failed");
    SearchOutcome::Failed(err.to_string())
}

/// Map a transport error, keeping timeouts recognizable
pub(crate) fn transport_error(service: &str, timeout: Duration, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::UpstreamTimeout {
            service: service.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        AppError::upstream(service, err.to_string())
    }
}

/// Build an HTTP client bounded by `timeout`
pub(crate) fn http_client(timeout: Duration) -> routeforge_common::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("routeforge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
        })
}
