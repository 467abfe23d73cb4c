//! Query Router - picks exactly one agent per query
//!
//! Rules run in a fixed order and the first match wins:
//! 1. Conversational phrases (exact match)
//! 2. Paper-search keywords
//! 3. Document keywords, only while a document session is active
//! 4. Model-assisted classification, defaulting to web search

use crate::session::SessionState;
use routeforge_common::llm::{CompletionRequest, TextGenerator};
use routeforge_common::{AgentKind, Query};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which routing rule fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingTier {
    Conversational,
    PaperKeywords,
    DocumentKeywords,
    ModelAssisted,
}

impl RoutingTier {
    /// Fixed audit sentence for this tier
    pub fn rationale(&self) -> &'static str {
        match self {
            RoutingTier::Conversational => "Query was a direct conversational greeting.",
            RoutingTier::PaperKeywords => "Query contained high-certainty keywords for paper search.",
            RoutingTier::DocumentKeywords => {
                "Document context is active and query used high-certainty keywords for the document."
            }
            RoutingTier::ModelAssisted => "Query was ambiguous, used model-assisted routing.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingTier::Conversational => "conversational",
            RoutingTier::PaperKeywords => "paper_keywords",
            RoutingTier::DocumentKeywords => "document_keywords",
            RoutingTier::ModelAssisted => "model_assisted",
        }
    }
}

impl fmt::Display for RoutingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of routing one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub agent: AgentKind,
    pub tier: RoutingTier,
    pub rationale: String,
}

impl RoutingDecision {
    fn new(agent: AgentKind, tier: RoutingTier) -> Self {
        Self {
            agent,
            tier,
            rationale: tier.rationale().to_string(),
        }
    }
}

/// How a keyword rule compares against the normalized query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The whole query equals a phrase
    Exact,
    /// The query contains a phrase
    Contains,
}

/// A data-driven keyword rule
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub tier: RoutingTier,
    pub agent: AgentKind,
    pub mode: MatchMode,
    pub phrases: &'static [&'static str],
    /// Only applies while a document session is active
    pub requires_document: bool,
}

pub const CONVERSATIONAL_PHRASES: &[&str] = &[
    "hello",
    "hi",
    "hii",
    "hey",
    "who are you",
    "what are you",
    "hii buddy",
    "hello buddy",
    "what you can do",
];

pub const PAPER_KEYWORDS: &[&str] = &["arxiv", "research paper", "scientific paper"];

pub const DOCUMENT_KEYWORDS: &[&str] = &[
    "this document",
    "the pdf",
    "in this file",
    "summarize this",
    "what is this pdf about",
    "acknowledgement",
];

/// Keyword rules in priority order
pub fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule {
            tier: RoutingTier::Conversational,
            agent: AgentKind::Conversational,
            mode: MatchMode::Exact,
            phrases: CONVERSATIONAL_PHRASES,
            requires_document: false,
        },
        KeywordRule {
            tier: RoutingTier::PaperKeywords,
            agent: AgentKind::Paper,
            mode: MatchMode::Contains,
            phrases: PAPER_KEYWORDS,
            requires_document: false,
        },
        KeywordRule {
            tier: RoutingTier::DocumentKeywords,
            agent: AgentKind::Document,
            mode: MatchMode::Contains,
            phrases: DOCUMENT_KEYWORDS,
            requires_document: true,
        },
    ]
}

/// Labels the classifier may answer with
const LABELS: &[(&str, AgentKind)] = &[
    ("DOCUMENT_RAG", AgentKind::Document),
    ("PAPER_SEARCH", AgentKind::Paper),
    ("WEB_SEARCH", AgentKind::Web),
];

/// Map a classifier reply to an agent; `None` unless exactly one label appears
pub fn parse_label(reply: &str) -> Option<AgentKind> {
    let upper = reply.trim().to_uppercase();
    let mut found = LABELS
        .iter()
        .filter(|(label, _)| upper.contains(label))
        .map(|(_, agent)| *agent);

    match (found.next(), found.next()) {
        (Some(agent), None) => Some(agent),
        _ => None,
    }
}

fn classifier_prompt(document_active: bool) -> String {
    let status = if document_active {
        "A document is available for questions."
    } else {
        "No document has been uploaded."
    };

    format!(
        "You are an expert query routing agent. Your single task is to select the best tool for the user's query.\n\
         System Status: {}\n\
         Available Tools:\n\
         - 'DOCUMENT_RAG': Use for questions directly about the content of the uploaded document (e.g., 'what is the methodology?').\n\
         - 'PAPER_SEARCH': Use for queries about scientific papers, research, or anything mentioning ArXiv.\n\
         - 'WEB_SEARCH': Use for all other general knowledge questions, current events, or if no other tool is appropriate.\n\n\
         Respond with ONLY the name of the tool, and nothing else. Your entire response must be a single word: DOCUMENT_RAG, PAPER_SEARCH, or WEB_SEARCH.",
        status
    )
}

/// Query router
pub struct Router {
    rules: Vec<KeywordRule>,
    session: Arc<SessionState>,
    classifier: Arc<dyn TextGenerator>,
    temperature: f32,
}

impl Router {
    pub fn new(session: Arc<SessionState>, classifier: Arc<dyn TextGenerator>) -> Self {
        Self {
            rules: default_rules(),
            session,
            classifier,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn rule_matches(&self, rule: &KeywordRule, query: &Query) -> bool {
        // Session is read first so a stale read consumes expiry on a keyword miss
        if rule.requires_document && !self.session.is_document_active() {
            return false;
        }
        match rule.mode {
            MatchMode::Exact => query.equals_any(rule.phrases),
            MatchMode::Contains => query.contains_any(rule.phrases),
        }
    }

    /// Route a query; never fails
    pub async fn route(&self, query: &Query) -> RoutingDecision {
        for rule in &self.rules {
            if self.rule_matches(rule, query) {
                let decision = RoutingDecision::new(rule.agent, rule.tier);
                info!(agent = %decision.agent, tier = %decision.tier, "Routing decision");
                return decision;
            }
        }

        let agent = self.classify(query).await;
        let decision = RoutingDecision::new(agent, RoutingTier::ModelAssisted);
        info!(agent = %decision.agent, tier = %decision.tier, "Routing decision");
        decision
    }

    async fn classify(&self, query: &Query) -> AgentKind {
        let document_active = self.session.is_document_active();
        let request = CompletionRequest::new(
            "routing",
            classifier_prompt(document_active),
            query.original(),
        )
        .with_temperature(self.temperature);

        match self.classifier.complete(request).await {
            Ok(reply) => {
                debug!(reply = %reply, document_active, "Classifier replied");
                parse_label(&reply).unwrap_or_else(|| {
                    warn!(
                        query = %query.original(),
                        reply = %reply,
                        "Ambiguous classifier reply, defaulting to web search"
                    );
                    AgentKind::Web
                })
            }
            Err(e) => {
                warn!(query = %query.original(), error = %e, "Classifier failed, defaulting to web search");
                AgentKind::Web
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use routeforge_common::errors::{AppError, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeClassifier {
        reply: Option<&'static str>,
        calls: AtomicUsize,
        last_system: Mutex<String>,
    }

    impl FakeClassifier {
        fn replying(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply),
                calls: AtomicUsize::new(0),
                last_system: Mutex::new(String::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                calls: AtomicUsize::new(0),
                last_system: Mutex::new(String::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for FakeClassifier {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_system.lock().unwrap() = request.system;
            assert_eq!(request.temperature, 0.0);
            self.reply.map(str::to_string).ok_or_else(|| AppError::Generation {
                message: "quota exceeded".into(),
            })
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    fn router(classifier: Arc<FakeClassifier>, document_active: bool) -> Router {
        let session = Arc::new(SessionState::new(Duration::from_secs(1800)));
        if document_active {
            session.mark_uploaded();
        }
        Router::new(session, classifier)
    }

    #[tokio::test]
    async fn test_conversational_exact_match_only() {
        let classifier = FakeClassifier::replying("WEB_SEARCH");
        let router = router(classifier.clone(), false);

        let decision = router.route(&Query::new("Hello")).await;
        assert_eq!(decision.agent, AgentKind::Conversational);
        assert_eq!(decision.tier, RoutingTier::Conversational);
        assert_eq!(decision.rationale, RoutingTier::Conversational.rationale());

        // Containing a greeting is not enough
        let decision = router.route(&Query::new("hello, what is rust?")).await;
        assert_eq!(decision.tier, RoutingTier::ModelAssisted);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_paper_keywords_win_regardless_of_session() {
        for active in [false, true] {
            let classifier = FakeClassifier::replying("WEB_SEARCH");
            let router = router(classifier.clone(), active);

            let decision = router
                .route(&Query::new("Summarize this ArXiv preprint on diffusion"))
                .await;
            assert_eq!(decision.agent, AgentKind::Paper);
            assert_eq!(decision.tier, RoutingTier::PaperKeywords);
            assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_document_keywords_need_active_session() {
        let classifier = FakeClassifier::replying("WEB_SEARCH");
        let active = router(classifier.clone(), true);
        let decision = active.route(&Query::new("Summarize this for me")).await;
        assert_eq!(decision.agent, AgentKind::Document);
        assert_eq!(decision.tier, RoutingTier::DocumentKeywords);

        let inactive = router(classifier.clone(), false);
        let decision = inactive.route(&Query::new("Summarize this for me")).await;
        assert_eq!(decision.tier, RoutingTier::ModelAssisted);
        assert_eq!(decision.agent, AgentKind::Web);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_classifier_sees_document_status() {
        let classifier = FakeClassifier::replying("DOCUMENT_RAG");
        let router = router(classifier.clone(), true);

        let decision = router.route(&Query::new("what is the methodology?")).await;
        assert_eq!(decision.agent, AgentKind::Document);
        assert!(classifier
            .last_system
            .lock()
            .unwrap()
            .contains("A document is available for questions."));
    }

    #[tokio::test]
    async fn test_classifier_failure_defaults_to_web() {
        let classifier = FakeClassifier::failing();
        let router = router(classifier.clone(), false);

        let decision = router.route(&Query::new("who won the match yesterday")).await;
        assert_eq!(decision.agent, AgentKind::Web);
        assert_eq!(decision.tier, RoutingTier::ModelAssisted);
        assert_eq!(decision.rationale, RoutingTier::ModelAssisted.rationale());
    }

    #[tokio::test]
    async fn test_unrecognized_reply_defaults_to_web() {
        let classifier = FakeClassifier::replying("I think the best tool is a calculator");
        let router = router(classifier, false);
        let decision = router.route(&Query::new("2 + 2")).await;
        assert_eq!(decision.agent, AgentKind::Web);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_ambiguous_reply_warning_carries_query() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let classifier = FakeClassifier::replying("WEB_SEARCH or PAPER_SEARCH");
        let router = router(classifier, false);
        let decision = router.route(&Query::new("Borrow checker news")).await;
        assert_eq!(decision.agent, AgentKind::Web);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|l| l.contains("Ambiguous classifier reply"))
            .unwrap();
        assert!(line.contains("WARN"));
        assert!(line.contains("query=Borrow checker news"));
        assert!(line.contains("reply=WEB_SEARCH or PAPER_SEARCH"));
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label(" paper_search\n"), Some(AgentKind::Paper));
        assert_eq!(parse_label("DOCUMENT_RAG"), Some(AgentKind::Document));
        assert_eq!(parse_label("Tool: WEB_SEARCH."), Some(AgentKind::Web));
        assert_eq!(parse_label("WEB_SEARCH or PAPER_SEARCH"), None);
        assert_eq!(parse_label("PDF"), None);
        assert_eq!(parse_label(""), None);
    }

    #[test]
    fn test_each_tier_has_distinct_rationale() {
        let tiers = [
            RoutingTier::Conversational,
            RoutingTier::PaperKeywords,
            RoutingTier::DocumentKeywords,
            RoutingTier::ModelAssisted,
        ];
        for (i, a) in tiers.iter().enumerate() {
            for b in &tiers[i + 1..] {
                assert_ne!(a.rationale(), b.rationale());
            }
        }
    }
}
