//! Scholarly paper search over the arXiv Atom API

use super::arxiv_feed::{parse_feed, PaperRecord};
use super::{failed, http_client, transport_error, RetrievalBackend};
use async_trait::async_trait;
use routeforge_common::config::PaperSearchConfig;
use routeforge_common::errors::{AppError, Result};
use routeforge_common::{BackendKind, SearchOutcome};
use std::time::Duration;
use tracing::{info, warn};

/// Returned as content when the feed holds no well-formed entries
pub const NO_PAPERS_MESSAGE: &str = "No papers found on ArXiv for this query.";

const SERVICE: &str = "arxiv";

/// arXiv paper search backend
pub struct PaperSearch {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
    timeout: Duration,
}

impl PaperSearch {
    pub fn new(base_url: String, max_results: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url,
            max_results,
            timeout,
        })
    }

    pub fn from_config(config: &PaperSearchConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            config.max_results,
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn fetch_feed(&self, query: &str) -> Result<String> {
        let max_results = self.max_results.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", query),
                ("start", "0"),
                ("max_results", max_results.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, self.timeout, e))?;

        if !response.status().is_success() {
            return Err(AppError::upstream(SERVICE, format!("status {}", response.status())));
        }

        response
            .text()
            .await
            .map_err(|e| transport_error(SERVICE, self.timeout, e))
    }
}

/// Keep up to `limit` well-formed records and render them
pub(crate) fn render_papers(records: Vec<Option<PaperRecord>>, limit: usize) -> SearchOutcome {
    let total = records.len();
    let papers: Vec<PaperRecord> = records.into_iter().flatten().take(limit).collect();

    if papers.len() < total.min(limit) {
        warn!(entries = total, kept = papers.len(), "Skipped malformed arXiv entries");
    }

    if papers.is_empty() {
        return SearchOutcome::Found(NO_PAPERS_MESSAGE.to_string());
    }

    SearchOutcome::Found(
        papers
            .iter()
            .map(PaperRecord::render)
            .collect::<Vec<_>>()
            .join("\n\n"),
    )
}

#[async_trait]
impl RetrievalBackend for PaperSearch {
    fn kind(&self) -> BackendKind {
        BackendKind::Paper
    }

    async fn search(&self, query: &str) -> SearchOutcome {
        info!(query = %query, "Searching arXiv");

        let feed = match self.fetch_feed(query).await {
            Ok(feed) => feed,
            Err(e) => return failed(BackendKind::Paper, &e),
        };

        render_papers(parse_feed(&feed), self.max_results)
    }
}
