//! Configuration management for RouteForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Text generation (routing + synthesis) configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Web search providers
    #[serde(default)]
    pub web_search: WebSearchConfig,

    /// Scholarly paper search
    #[serde(default)]
    pub paper_search: PaperSearchConfig,

    /// Document indexing and retrieval
    #[serde(default)]
    pub document: DocumentConfig,

    /// Document session window
    #[serde(default)]
    pub session: SessionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum request body in bytes (document uploads)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,

    /// API key (GROQ_API_KEY is honoured as an override)
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Temperature for the routing classifier
    #[serde(default = "default_routing_temperature")]
    pub routing_temperature: f32,

    /// Temperature for answer synthesis
    #[serde(default = "default_synthesis_temperature")]
    pub synthesis_temperature: f32,

    /// Maximum output tokens for synthesis
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hashing
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (hashing provider)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebSearchConfig {
    /// SerpAPI key; without it the primary provider is skipped
    pub serpapi_key: Option<String>,

    #[serde(default = "default_serpapi_url")]
    pub serpapi_url: String,

    #[serde(default = "default_duckduckgo_url")]
    pub duckduckgo_url: String,

    /// Results kept per provider
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    #[serde(default = "default_primary_timeout")]
    pub primary_timeout_secs: u64,

    #[serde(default = "default_fallback_timeout")]
    pub fallback_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaperSearchConfig {
    #[serde(default = "default_arxiv_url")]
    pub base_url: String,

    #[serde(default = "default_result_limit")]
    pub max_results: usize,

    #[serde(default = "default_primary_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Neighbours returned for specific questions
    #[serde(default = "default_specific_k")]
    pub specific_k: usize,

    /// Neighbours returned when a summary query finds no first-page content
    #[serde(default = "default_summary_k")]
    pub summary_fallback_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// How long an uploaded document stays active, in seconds
    #[serde(default = "default_document_timeout")]
    pub document_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g. "info", "routeforge_context=debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Expose Prometheus metrics on /metrics
    #[serde(default = "default_enabled")]
    pub metrics_enabled: bool,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_request_timeout() -> u64 { 60 }
fn default_max_body_bytes() -> usize { 16 * 1024 * 1024 }
fn default_generation_endpoint() -> String { "https://api.groq.com/openai/v1/chat/completions".to_string() }
fn default_generation_model() -> String { crate::DEFAULT_GENERATION_MODEL.to_string() }
fn default_generation_timeout() -> u64 { 10 }
fn default_routing_temperature() -> f32 { 0.0 }
fn default_synthesis_temperature() -> f32 { 0.3 }
fn default_max_tokens() -> usize { 1024 }
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 10 }
fn default_serpapi_url() -> String { "https://serpapi.com/search".to_string() }
fn default_duckduckgo_url() -> String { "https://api.duckduckgo.com".to_string() }
fn default_arxiv_url() -> String { "https://export.arxiv.org/api/query".to_string() }
fn default_result_limit() -> usize { 3 }
fn default_primary_timeout() -> u64 { 10 }
fn default_fallback_timeout() -> u64 { 8 }
fn default_chunk_size() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 150 }
fn default_specific_k() -> usize { 5 }
fn default_summary_k() -> usize { 3 }
fn default_document_timeout() -> u64 { 30 * 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "routeforge".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            // Provider keys under their conventional names
            .set_override_option("generation.api_key", std::env::var("GROQ_API_KEY").ok())?
            .set_override_option("web_search.serpapi_key", std::env::var("SERPAPI_KEY").ok())?

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get the document session window as Duration
    pub fn document_window(&self) -> Duration {
        Duration::from_secs(self.session.document_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generation_endpoint(),
            api_key: None,
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
            routing_temperature: default_routing_temperature(),
            synthesis_temperature: default_synthesis_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            serpapi_key: None,
            serpapi_url: default_serpapi_url(),
            duckduckgo_url: default_duckduckgo_url(),
            result_limit: default_result_limit(),
            primary_timeout_secs: default_primary_timeout(),
            fallback_timeout_secs: default_fallback_timeout(),
        }
    }
}

impl Default for PaperSearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_arxiv_url(),
            max_results: default_result_limit(),
            timeout_secs: default_primary_timeout(),
        }
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            specific_k: default_specific_k(),
            summary_fallback_k: default_summary_k(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            document_timeout_secs: default_document_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_enabled: default_enabled(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            generation: GenerationConfig::default(),
            embedding: EmbeddingConfig::default(),
            web_search: WebSearchConfig::default(),
            paper_search: PaperSearchConfig::default(),
            document: DocumentConfig::default(),
            session: SessionConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.document.chunk_size, 1000);
        assert_eq!(config.document.chunk_overlap, 150);
        assert_eq!(config.web_search.result_limit, 3);
        assert!(config.web_search.serpapi_key.is_none());
    }

    #[test]
    fn test_document_window_is_thirty_minutes() {
        let config = AppConfig::default();
        assert_eq!(config.document_window(), Duration::from_secs(1800));
    }

    #[test]
    fn test_timeouts_bounded() {
        let config = AppConfig::default();
        assert!(config.web_search.primary_timeout_secs <= 10);
        assert!(config.web_search.fallback_timeout_secs <= config.web_search.primary_timeout_secs);
        assert_eq!(config.paper_search.timeout_secs, 10);
        assert!(config.generation.timeout_secs <= 10);
        assert!(config.embedding.timeout_secs <= 10);
        assert!(config.request_timeout() > Duration::from_secs(config.generation.timeout_secs));
    }

    #[test]
    fn test_partial_sections_fall_back_to_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("server.port", 8081)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.session.document_timeout_secs, 1800);
    }
}
