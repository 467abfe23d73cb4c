//! Web search with provider fallback
//!
//! The primary provider (SerpAPI, Google engine) runs only when a key is
//! configured. Any primary failure, including zero results, falls through to
//! the DuckDuckGo Instant Answer API.

use super::{failed, http_client, transport_error, RetrievalBackend};
use async_trait::async_trait;
use routeforge_common::config::WebSearchConfig;
use routeforge_common::errors::{AppError, Result};
use routeforge_common::{BackendKind, SearchOutcome};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A single attributed web result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebHit {
    pub title: String,
    pub source: String,
    pub link: String,
    pub snippet: String,
}

impl WebHit {
    /// Render as an attributed block the synthesizer can cite
    pub fn render(&self) -> String {
        format!(
            "Title: {}\nSource: {}\nLink: {}\nSnippet: {}",
            self.title, self.source, self.link, self.snippet
        )
    }
}

fn render_hits(hits: &[WebHit]) -> String {
    hits.iter().map(WebHit::render).collect::<Vec<_>>().join("\n\n")
}

/// A web search provider
#[async_trait]
pub trait WebProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Return up to `limit` hits; an error means the provider failed
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebHit>>;
}

/// Web search backend
pub struct WebSearch {
    primary: Option<Arc<dyn WebProvider>>,
    fallback: Arc<dyn WebProvider>,
    limit: usize,
}

impl WebSearch {
    pub fn new(
        primary: Option<Arc<dyn WebProvider>>,
        fallback: Arc<dyn WebProvider>,
        limit: usize,
    ) -> Self {
        Self { primary, fallback, limit }
    }

    /// Wire SerpAPI (when keyed) and DuckDuckGo from configuration
    pub fn from_config(config: &WebSearchConfig) -> Result<Self> {
        let primary: Option<Arc<dyn WebProvider>> = match config.serpapi_key.as_deref() {
            Some(key) if !key.is_empty() => Some(Arc::new(SerpApiProvider::new(
                config.serpapi_url.clone(),
                key.to_string(),
                Duration::from_secs(config.primary_timeout_secs),
            )?)),
            _ => None,
        };

        let fallback = Arc::new(DuckDuckGoProvider::new(
            config.duckduckgo_url.clone(),
            Duration::from_secs(config.fallback_timeout_secs),
        )?);

        Ok(Self::new(primary, fallback, config.result_limit))
    }
}

#[async_trait]
impl RetrievalBackend for WebSearch {
    fn kind(&self) -> BackendKind {
        BackendKind::Web
    }

    async fn search(&self, query: &str) -> SearchOutcome {
        if let Some(primary) = &self.primary {
            match primary.search(query, self.limit).await {
                Ok(hits) if !hits.is_empty() => {
                    info!(provider = primary.name(), results = hits.len(), "Primary web search succeeded");
                    return SearchOutcome::Found(render_hits(&hits));
                }
                Ok(_) => warn!(provider = primary.name(), "Primary web search returned no results"),
                Err(e) => warn!(provider = primary.name(), error = %e, "Primary web search failed"),
            }
        }

        info!(provider = self.fallback.name(), "Using fallback web search");
        match self.fallback.search(query, self.limit).await {
            Ok(hits) if !hits.is_empty() => {
                info!(provider = self.fallback.name(), results = hits.len(), "Fallback web search succeeded");
                SearchOutcome::Found(render_hits(&hits))
            }
            Ok(_) => {
                warn!(provider = self.fallback.name(), "Fallback web search returned no results");
                SearchOutcome::Empty
            }
            Err(e) => failed(BackendKind::Web, &e),
        }
    }
}

/// SerpAPI Google search
pub struct SerpApiProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl SerpApiProvider {
    pub fn new(url: String, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url,
            api_key,
            timeout,
        })
    }
}

#[derive(Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpOrganic>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct SerpOrganic {
    title: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
    displayed_link: Option<String>,
}

fn parse_serpapi(body: &str, limit: usize) -> Result<Vec<WebHit>> {
    let response: SerpResponse = serde_json::from_str(body).map_err(|e| AppError::MalformedResponse {
        service: "serpapi".to_string(),
        message: e.to_string(),
    })?;

    if let Some(error) = response.error {
        return Err(AppError::upstream("serpapi", error));
    }

    Ok(response
        .organic_results
        .into_iter()
        .take(limit)
        .map(|r| WebHit {
            title: r.title.unwrap_or_else(|| "No Title".to_string()),
            source: r.displayed_link.unwrap_or_else(|| "Unknown Source".to_string()),
            link: r.link.unwrap_or_else(|| "#".to_string()),
            snippet: r.snippet.unwrap_or_else(|| "No snippet available.".to_string()),
        })
        .collect())
}

#[async_trait]
impl WebProvider for SerpApiProvider {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebHit>> {
        let num = limit.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("q", query),
                ("engine", "google"),
                ("api_key", self.api_key.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(self.name(), self.timeout, e))?;

        if !response.status().is_success() {
            return Err(AppError::upstream(self.name(), format!("status {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(self.name(), self.timeout, e))?;
        parse_serpapi(&body, limit)
    }
}

/// DuckDuckGo Instant Answer API
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl DuckDuckGoProvider {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url,
            timeout,
        })
    }
}

#[derive(Deserialize)]
struct DdgResponse {
    #[serde(rename = "Heading", default)]
    heading: Option<String>,
    #[serde(rename = "AbstractText", default)]
    abstract_text: Option<String>,
    #[serde(rename = "AbstractSource", default)]
    abstract_source: Option<String>,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: Option<String>,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<DdgTopic>,
}

// Grouped topics carry "Name"/"Topics" and no "Text"; they are skipped.
#[derive(Deserialize)]
struct DdgTopic {
    #[serde(rename = "Text")]
    text: Option<String>,
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn parse_duckduckgo(body: &str, limit: usize) -> Result<Vec<WebHit>> {
    let response: DdgResponse = serde_json::from_str(body).map_err(|e| AppError::MalformedResponse {
        service: "duckduckgo".to_string(),
        message: e.to_string(),
    })?;

    let mut hits = Vec::new();

    if let Some(abstract_text) = response.abstract_text.filter(|t| !t.trim().is_empty()) {
        hits.push(WebHit {
            title: non_empty_or(response.heading, "Summary"),
            source: non_empty_or(response.abstract_source, "DuckDuckGo"),
            link: non_empty_or(response.abstract_url, "#"),
            snippet: abstract_text,
        });
    }

    for topic in response.related_topics {
        if hits.len() >= limit {
            break;
        }
        let Some(text) = topic.text.filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        hits.push(WebHit {
            title: "Related topic".to_string(),
            source: "DuckDuckGo".to_string(),
            link: topic.first_url.unwrap_or_else(|| "#".to_string()),
            snippet: text,
        });
    }

    Ok(hits)
}

#[async_trait]
impl WebProvider for DuckDuckGoProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebHit>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", query), ("format", "json"), ("no_redirect", "1")])
            .send()
            .await
            .map_err(|e| transport_error(self.name(), self.timeout, e))?;

        // A non-success status is "nothing found" for this lightweight API
        if !response.status().is_success() {
            warn!(status = %response.status(), "DuckDuckGo returned non-success status");
            return Ok(Vec::new());
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(self.name(), self.timeout, e))?;
        parse_duckduckgo(&body, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::stub;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Script {
        Hits(Vec<WebHit>),
        Status(u16),
        Timeout,
    }

    struct ScriptedProvider {
        name: &'static str,
        script: Script,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(name: &'static str, script: Script) -> Arc<Self> {
            Arc::new(Self { name, script, calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WebProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<WebHit>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Hits(hits) => Ok(hits.iter().take(limit).cloned().collect()),
                Script::Status(code) => Err(AppError::upstream(self.name, format!("status {}", code))),
                Script::Timeout => Err(AppError::UpstreamTimeout {
                    service: self.name.to_string(),
                    timeout_ms: 8000,
                }),
            }
        }
    }

    fn hit(title: &str) -> WebHit {
        WebHit {
            title: title.to_string(),
            source: "example.org".to_string(),
            link: format!("https://example.org/{}", title),
            snippet: format!("About {}", title),
        }
    }

    #[tokio::test]
    async fn test_primary_500_invokes_fallback_and_empty_fallback_is_empty() {
        let primary = ScriptedProvider::new("serpapi", Script::Status(500));
        let fallback = ScriptedProvider::new("duckduckgo", Script::Hits(vec![]));
        let search = WebSearch::new(Some(primary.clone() as Arc<dyn WebProvider>), fallback.clone(), 3);

        let outcome = search.search("who won the match").await;

        assert_eq!(outcome, SearchOutcome::Empty);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_primary_zero_results_falls_through() {
        let primary = ScriptedProvider::new("serpapi", Script::Hits(vec![]));
        let fallback = ScriptedProvider::new("duckduckgo", Script::Hits(vec![hit("rust")]));
        let search = WebSearch::new(Some(primary.clone() as Arc<dyn WebProvider>), fallback.clone(), 3);

        let outcome = search.search("rust").await;

        assert_eq!(fallback.calls(), 1);
        assert!(matches!(outcome, SearchOutcome::Found(ref text) if text.contains("Title: rust")));
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = ScriptedProvider::new("serpapi", Script::Hits(vec![hit("a"), hit("b")]));
        let fallback = ScriptedProvider::new("duckduckgo", Script::Hits(vec![hit("c")]));
        let search = WebSearch::new(Some(primary as Arc<dyn WebProvider>), fallback.clone(), 3);

        let SearchOutcome::Found(text) = search.search("q").await else {
            panic!("expected results");
        };

        assert_eq!(fallback.calls(), 0);
        assert_eq!(text.matches("Title: ").count(), 2);
        assert!(text.contains("Source: example.org\nLink: https://example.org/a\nSnippet: About a"));
        assert!(text.contains("\n\nTitle: b"));
    }

    #[tokio::test]
    async fn test_fallback_fault_is_failed() {
        let fallback = ScriptedProvider::new("duckduckgo", Script::Timeout);
        let search = WebSearch::new(None, fallback, 3);

        let outcome = search.search("q").await;

        assert!(outcome.is_failed());
    }

    #[tokio::test]
    async fn test_without_primary_only_fallback_runs() {
        let fallback = ScriptedProvider::new("duckduckgo", Script::Hits(vec![hit("x")]));
        let search = WebSearch::new(None, fallback.clone(), 3);

        assert!(matches!(search.search("x").await, SearchOutcome::Found(_)));
        assert_eq!(fallback.calls(), 1);
    }

    #[test]
    fn test_parse_serpapi_defaults_missing_fields() {
        let body = r#"{"organic_results": [
            {"title": "Rust", "link": "https://rust-lang.org", "displayed_link": "rust-lang.org", "snippet": "A language"},
            {"link": "https://example.com"},
            {"title": "Third"},
            {"title": "Fourth"}
        ]}"#;

        let hits = parse_serpapi(body, 3).unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].source, "rust-lang.org");
        assert_eq!(hits[1].title, "No Title");
        assert_eq!(hits[1].snippet, "No snippet available.");
        assert_eq!(hits[2].link, "#");
        assert_eq!(hits[2].source, "Unknown Source");
    }

    #[test]
    fn test_parse_serpapi_error_payload() {
        let err = parse_serpapi(r#"{"error": "Invalid API key."}"#, 3).unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
    }

    #[test]
    fn test_parse_serpapi_malformed() {
        let err = parse_serpapi("<html>", 3).unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_duckduckgo_abstract_and_topics() {
        let body = r#"{
            "Heading": "Rust (programming language)",
            "AbstractText": "Rust is a general-purpose programming language.",
            "AbstractSource": "Wikipedia",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
            "RelatedTopics": [
                {"Text": "Cargo - package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                {"Name": "Group", "Topics": []},
                {"Text": "Ferris - mascot", "FirstURL": "https://duckduckgo.com/Ferris"}
            ]
        }"#;

        let hits = parse_duckduckgo(body, 3).unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Rust (programming language)");
        assert_eq!(hits[0].source, "Wikipedia");
        assert_eq!(hits[1].snippet, "Cargo - package manager");
        assert_eq!(hits[2].link, "https://duckduckgo.com/Ferris");
    }

    #[test]
    fn test_parse_duckduckgo_respects_limit() {
        let body = r#"{
            "AbstractText": "Abstract.",
            "RelatedTopics": [
                {"Text": "One", "FirstURL": "https://duckduckgo.com/1"},
                {"Text": "Two", "FirstURL": "https://duckduckgo.com/2"},
                {"Text": "Three", "FirstURL": "https://duckduckgo.com/3"}
            ]
        }"#;

        let hits = parse_duckduckgo(body, 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].snippet, "One");
    }

    #[test]
    fn test_parse_duckduckgo_nothing() {
        let hits = parse_duckduckgo(r#"{"AbstractText": "", "RelatedTopics": []}"#, 3).unwrap();
        assert!(hits.is_empty());
    }

    fn stub_config(base: &str, serpapi_key: Option<&str>) -> WebSearchConfig {
        WebSearchConfig {
            serpapi_key: serpapi_key.map(str::to_string),
            serpapi_url: format!("{}/serp", base),
            duckduckgo_url: format!("{}/ddg", base),
            primary_timeout_secs: 2,
            fallback_timeout_secs: 2,
            ..WebSearchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_serpapi_server_error_falls_back_to_duckduckgo() {
        let base = stub::serve(vec![
            stub::Reply { path: "/serp", status: 500, body: "internal error" },
            stub::Reply {
                path: "/ddg",
                status: 200,
                body: r#"{"Heading": "Ferris", "AbstractText": "The Rust mascot.", "AbstractSource": "Wikipedia", "AbstractURL": "https://example.org/ferris", "RelatedTopics": []}"#,
            },
        ])
        .await;

        let search = WebSearch::from_config(&stub_config(&base, Some("key"))).unwrap();
        let outcome = search.search("ferris").await;
        assert_eq!(
            outcome,
            SearchOutcome::Found(
                "Title: Ferris\nSource: Wikipedia\nLink: https://example.org/ferris\nSnippet: The Rust mascot.".into()
            )
        );
    }

    #[tokio::test]
    async fn test_serpapi_server_error_and_empty_fallback_is_empty() {
        let base = stub::serve(vec![
            stub::Reply { path: "/serp", status: 500, body: "" },
            stub::Reply {
                path: "/ddg",
                status: 200,
                body: r#"{"AbstractText": "", "RelatedTopics": []}"#,
            },
        ])
        .await;

        let search = WebSearch::from_config(&stub_config(&base, Some("key"))).unwrap();
        assert_eq!(search.search("nothing here").await, SearchOutcome::Empty);
    }

    #[tokio::test]
    async fn test_serpapi_provider_rejects_non_success_status() {
        let base = stub::serve(vec![stub::Reply { path: "/serp", status: 403, body: "{}" }]).await;

        let provider =
            SerpApiProvider::new(format!("{}/serp", base), "key".into(), Duration::from_secs(2)).unwrap();
        let err = provider.search("rust", 3).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_duckduckgo_unavailable_is_empty() {
        let base = stub::serve(vec![stub::Reply { path: "/ddg", status: 503, body: "" }]).await;

        let provider = DuckDuckGoProvider::new(format!("{}/ddg", base), Duration::from_secs(2)).unwrap();
        assert!(provider.search("rust", 3).await.unwrap().is_empty());

        let search = WebSearch::from_config(&stub_config(&base, None)).unwrap();
        assert_eq!(search.search("rust").await, SearchOutcome::Empty);
    }
}
