//! Domain types shared by routing, retrieval, and synthesis

use serde::{Deserialize, Serialize};
use std::fmt;

/// An incoming user query
///
/// The normalized form is used for keyword matching only. Retrieval and
/// synthesis always receive the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    original: String,
    normalized: String,
}

impl Query {
    pub fn new(raw: impl Into<String>) -> Self {
        let original = raw.into();
        let normalized = original.trim().to_lowercase();
        Self { original, normalized }
    }

    /// Text exactly as the caller sent it
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Trimmed, lower-cased text
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// True when the normalized query contains any of the keywords
    pub fn contains_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|kw| self.normalized.contains(kw))
    }

    /// True when the normalized query equals one of the phrases
    pub fn equals_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.normalized == *p)
    }
}

/// Retrieval backend variants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendKind {
    /// Semantic search over the uploaded document
    Document,
    /// General web search
    Web,
    /// Scholarly paper search
    Paper,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Document => "document",
            BackendKind::Web => "web",
            BackendKind::Paper => "paper",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The agent that produced an answer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentKind {
    Conversational,
    Document,
    Web,
    Paper,
}

impl AgentKind {
    /// Backend this agent retrieves from, `None` for the conversational shortcut
    pub fn backend(&self) -> Option<BackendKind> {
        match self {
            AgentKind::Conversational => None,
            AgentKind::Document => Some(BackendKind::Document),
            AgentKind::Web => Some(BackendKind::Web),
            AgentKind::Paper => Some(BackendKind::Paper),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Conversational => "CONVERSATIONAL",
            AgentKind::Document => "DOCUMENT",
            AgentKind::Web => "WEB",
            AgentKind::Paper => "PAPER",
        }
    }
}

impl From<BackendKind> for AgentKind {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Document => AgentKind::Document,
            BackendKind::Web => AgentKind::Web,
            BackendKind::Paper => AgentKind::Paper,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single backend search
///
/// `Empty` and `Failed` are distinct outcomes but both suppress synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Attributed context text
    Found(String),
    /// The search ran and found nothing relevant
    Empty,
    /// The search mechanism itself failed
    Failed(String),
}

impl SearchOutcome {
    /// Context text usable for synthesis, if any
    pub fn usable_context(&self) -> Option<&str> {
        match self {
            SearchOutcome::Found(text) if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }

    /// Metric/log label
    pub fn label(&self) -> &'static str {
        match self {
            SearchOutcome::Found(_) => "found",
            SearchOutcome::Empty => "empty",
            SearchOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SearchOutcome::Failed(_))
    }
}

/// Terminal response for one query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub answer: String,
    pub agent_used: AgentKind,
    pub rationale: String,
}
