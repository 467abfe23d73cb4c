//! Context Engine - the query pipeline
//!
//! normalize -> route -> retrieve from exactly one backend -> synthesize.
//! Every stage degrades to a safe default, so `ask` always produces an
//! [`AnswerResponse`].

use crate::router::{Router, RoutingDecision};
use crate::session::SessionState;
use crate::synthesizer::Synthesizer;
use routeforge_common::config::AppConfig;
use routeforge_common::embeddings::create_embedder;
use routeforge_common::errors::Result;
use routeforge_common::llm::{ChatCompletionClient, TextGenerator};
use routeforge_common::metrics;
use routeforge_common::{AgentKind, AnswerResponse, BackendKind, Query};
use routeforge_search::{
    DocumentIndex, DocumentStore, IndexReport, PaperSearch, RetrievalBackend, WebSearch,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Canned reply for the conversational shortcut
pub const CAPABILITIES_MESSAGE: &str = "I am a multi-agent research assistant. I can search the web, \
find research papers on ArXiv, and answer questions about documents you upload.";

/// The three retrieval backends
pub struct Backends {
    pub document: Arc<dyn RetrievalBackend>,
    pub web: Arc<dyn RetrievalBackend>,
    pub paper: Arc<dyn RetrievalBackend>,
}

impl Backends {
    fn get(&self, kind: BackendKind) -> &Arc<dyn RetrievalBackend> {
        match kind {
            BackendKind::Document => &self.document,
            BackendKind::Web => &self.web,
            BackendKind::Paper => &self.paper,
        }
    }
}

/// Query pipeline shared by all requests
pub struct ContextEngine {
    router: Router,
    backends: Backends,
    synthesizer: Synthesizer,
    session: Arc<SessionState>,
    index: Arc<DocumentIndex>,
}

impl ContextEngine {
    pub fn new(
        router: Router,
        backends: Backends,
        synthesizer: Synthesizer,
        session: Arc<SessionState>,
        index: Arc<DocumentIndex>,
    ) -> Self {
        Self {
            router,
            backends,
            synthesizer,
            session,
            index,
        }
    }

    /// Wire providers, backends, and the session from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let generator: Arc<dyn TextGenerator> =
            Arc::new(ChatCompletionClient::new(config.generation.clone())?);
        let embedder = create_embedder(&config.embedding)?;

        let session = Arc::new(SessionState::new(config.document_window()));
        let index = Arc::new(DocumentIndex::from_config(embedder, &config.document)?);

        let backends = Backends {
            document: Arc::new(DocumentStore::from_config(index.clone(), &config.document)),
            web: Arc::new(WebSearch::from_config(&config.web_search)?),
            paper: Arc::new(PaperSearch::from_config(&config.paper_search)?),
        };

        let router = Router::new(session.clone(), generator.clone())
            .with_temperature(config.generation.routing_temperature);
        let synthesizer = Synthesizer::new(generator)
            .with_temperature(config.generation.synthesis_temperature)
            .with_max_tokens(config.generation.max_tokens);

        info!(
            model = %config.generation.model,
            document_window_secs = config.session.document_timeout_secs,
            web_primary = config.web_search.serpapi_key.is_some(),
            "Context engine initialized"
        );

        Ok(Self::new(router, backends, synthesizer, session, index))
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Answer one query; never fails
    #[instrument(skip(self, raw_query), fields(query_len = raw_query.len()))]
    pub async fn ask(&self, raw_query: &str) -> AnswerResponse {
        let started = Instant::now();
        let query = Query::new(raw_query);

        let RoutingDecision { agent, tier, rationale } = self.router.route(&query).await;
        metrics::record_routing(agent.as_str(), tier.as_str());

        let Some(kind) = agent.backend() else {
            info!(agent = %agent, tier = %tier, "Answered conversationally");
            return AnswerResponse {
                answer: CAPABILITIES_MESSAGE.to_string(),
                agent_used: AgentKind::Conversational,
                rationale,
            };
        };

        let search_started = Instant::now();
        let context = self.backends.get(kind).search(query.original()).await;
        let search_elapsed = search_started.elapsed();
        metrics::record_backend_search(search_elapsed.as_secs_f64(), kind.as_str(), context.label());

        let outcome = self.synthesizer.synthesize(query.original(), &context).await;
        metrics::record_synthesis(outcome.label());

        info!(
            query = %query.original(),
            agent = %agent,
            tier = %tier,
            backend = %kind,
            context = context.label(),
            synthesis = outcome.label(),
            search_ms = search_elapsed.as_millis() as u64,
            latency_ms = started.elapsed().as_millis() as u64,
            "Query answered"
        );

        AnswerResponse {
            answer: outcome.into_answer(),
            agent_used: agent,
            rationale,
        }
    }

    /// Start or reset the document session timer
    pub fn document_uploaded(&self) {
        self.session.mark_uploaded();
    }

    /// Index a document and start its session
    pub async fn upload_document(&self, source: &str, pages: Vec<String>) -> Result<IndexReport> {
        let report = self.index.index_document(source, pages).await?;
        self.document_uploaded();
        Ok(report)
    }
}
