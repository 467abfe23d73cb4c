//! Text generation abstraction
//!
//! One synchronous-style completion call: system instructions plus a single
//! user message in, text out. Used by the router's classifier and by the
//! answer synthesizer.

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A single completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System instructions
    pub system: String,

    /// User message
    pub user: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum output tokens
    pub max_tokens: Option<usize>,

    /// Purpose label for logs and metrics ("routing", "synthesis")
    pub purpose: &'static str,
}

impl CompletionRequest {
    pub fn new(purpose: &'static str, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.0,
            max_tokens: None,
            purpose,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Trait for text generation backends
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a request, returning the trimmed reply text
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// Client for OpenAI-compatible chat completion APIs (Groq, OpenAI, vLLM)
pub struct ChatCompletionClient {
    config: GenerationConfig,
    client: reqwest::Client,
}

impl ChatCompletionClient {
    /// Create a new client
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e)
            })?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let api_key = self.config.api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| {
            AppError::Configuration {
                message: "generation.api_key is not configured".to_string(),
            }
        })?;

        let started = Instant::now();

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self.client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::UpstreamTimeout {
                        service: "generation".to_string(),
                        timeout_ms: self.config.timeout_secs * 1000,
                    }
                } else {
                    AppError::Generation {
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("API error {}: {}", status, body),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse response: {}", e),
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| AppError::Generation {
                message: "Empty response from model".to_string(),
            })?;

        let elapsed = started.elapsed();
        crate::metrics::record_generation(elapsed.as_secs_f64(), request.purpose);
        tracing::debug!(
            purpose = request.purpose,
            model = %self.config.model,
            latency_ms = elapsed.as_millis() as u64,
            "Completion received"
        );

        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
