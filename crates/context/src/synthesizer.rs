//! Answer Synthesizer - generates answers grounded in retrieved context
//!
//! Generation runs only when the backend produced usable context. The
//! outcome stays tagged so that a refusal (no answer in context) and a
//! failed generation call remain distinguishable.

use routeforge_common::llm::{CompletionRequest, TextGenerator};
use routeforge_common::SearchOutcome;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Returned when there is no usable context
pub const UNABLE_TO_RETRIEVE_MESSAGE: &str =
    "I'm sorry, I was unable to retrieve the necessary information to answer your question.";

/// The model's verbatim reply when the context holds no answer
pub const NO_ANSWER_MESSAGE: &str = "I could not find a relevant answer in the provided information.";

/// Returned when the generation call fails
pub const GENERATION_FAILED_MESSAGE: &str = "An error occurred while generating the final response.";

/// Markers of broad, summary-style questions
pub const BROAD_MARKERS: &[&str] = &[
    "summarize",
    "summary",
    "overview",
    "latest news",
    "recent developments",
    "what is this about",
];

/// Answer style derived from the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStyle {
    /// Synthesize across all snippets
    Summary,
    /// Answer the specific question
    Direct,
}

impl AnswerStyle {
    pub fn for_query(query: &str) -> Self {
        let lowered = query.to_lowercase();
        if BROAD_MARKERS.iter().any(|m| lowered.contains(m)) {
            AnswerStyle::Summary
        } else {
            AnswerStyle::Direct
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            AnswerStyle::Summary => {
                "This is a broad request: write a concise, coherent summary drawing on ALL relevant context snippets."
            }
            AnswerStyle::Direct => {
                "This is a specific question: answer it clearly and directly using the context."
            }
        }
    }
}

/// Result of one synthesis attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// The model answered from context
    Answered(String),
    /// The model found no answer in the context
    NoAnswerInContext,
    /// No usable context; generation was not invoked
    SkippedNoContext,
    /// The generation call failed
    GenerationFailed,
}

impl SynthesisOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SynthesisOutcome::Answered(_) => "answered",
            SynthesisOutcome::NoAnswerInContext => "no_answer_in_context",
            SynthesisOutcome::SkippedNoContext => "skipped_no_context",
            SynthesisOutcome::GenerationFailed => "generation_failed",
        }
    }

    /// User-facing answer text
    pub fn into_answer(self) -> String {
        match self {
            SynthesisOutcome::Answered(text) => text,
            SynthesisOutcome::NoAnswerInContext => NO_ANSWER_MESSAGE.to_string(),
            SynthesisOutcome::SkippedNoContext => UNABLE_TO_RETRIEVE_MESSAGE.to_string(),
            SynthesisOutcome::GenerationFailed => GENERATION_FAILED_MESSAGE.to_string(),
        }
    }
}

const SYSTEM_PROMPT: &str = "You are an expert Q&A and summarization assistant. Your task is to answer the user's query based *only* on the provided context.

Instructions:
- If the user asks for \"latest news\", \"recent developments\", or a general summary, synthesize a concise and coherent summary from ALL relevant context snippets provided.
- If the user asks a specific question, provide a clear and direct answer using information from the context.
- Prioritize factual information, sources, and links if they are provided in the context.
- If the context is irrelevant, empty, or does not contain a clear answer, you MUST respond with: 'I could not find a relevant answer in the provided information.'
- Do not make up information or use prior knowledge not present in the context.";

fn is_refusal(reply: &str) -> bool {
    reply.trim().trim_matches(|c| c == '\'' || c == '"') == NO_ANSWER_MESSAGE
}

/// Synthesizer for grounded answers
pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
    temperature: f32,
    max_tokens: Option<usize>,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            temperature: 0.3,
            max_tokens: None,
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

    fn build_request(&self, query: &str, context: &str) -> CompletionRequest {
        let style = AnswerStyle::for_query(query);
        let system = format!("{}\n- {}", SYSTEM_PROMPT, style.instruction());
        let user = format!("Context:\n{}\n\nUser Query: {}", context, query);

        let request = CompletionRequest::new("synthesis", system, user).with_temperature(self.temperature);
        match self.max_tokens {
            Some(max_tokens) => request.with_max_tokens(max_tokens),
            None => request,
        }
    }

    /// Answer `query` from `context`; never fails
    pub async fn synthesize(&self, query: &str, context: &SearchOutcome) -> SynthesisOutcome {
        let Some(context_text) = context.usable_context() else {
            warn!(context = context.label(), "No usable context, skipping synthesis");
            return SynthesisOutcome::SkippedNoContext;
        };

        let request = self.build_request(query, context_text);
        match self.generator.complete(request).await {
            Ok(reply) if is_refusal(&reply) => {
                info!("Context did not contain an answer");
                SynthesisOutcome::NoAnswerInContext
            }
            Ok(reply) if reply.trim().is_empty() => {
                warn!("Generation returned an empty answer");
                SynthesisOutcome::GenerationFailed
            }
            Ok(reply) => SynthesisOutcome::Answered(reply),
            Err(e) => {
                error!(error = %e, code = ?e.code(), "Answer generation failed");
                SynthesisOutcome::GenerationFailed
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

    struct FakeGenerator {
        reply: Option<String>,
        calls: AtomicUsize,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeGenerator {
        fn new(reply: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);
            self.reply.clone().ok_or_else(|| AppError::UpstreamTimeout {
                service: "generation".into(),
                timeout_ms: 30_000,
            })
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn test_empty_context_skips_generation() {
        let generator = FakeGenerator::new(Some("should not be used"));
        let synthesizer = Synthesizer::new(generator.clone());

        for context in [
            SearchOutcome::Empty,
            SearchOutcome::Failed("timeout".into()),
            SearchOutcome::Found("   \n".into()),
        ] {
            let outcome = synthesizer.synthesize("what happened?", &context).await;
            assert_eq!(outcome, SynthesisOutcome::SkippedNoContext);
            assert_eq!(outcome.into_answer(), UNABLE_TO_RETRIEVE_MESSAGE);
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_answer_from_context() {
        let generator = FakeGenerator::new(Some("Rust 1.0 shipped in May 2015."));
        let synthesizer = Synthesizer::new(generator.clone());

        let context = SearchOutcome::Found("Title: Rust\nSnippet: Released May 2015".into());
        let outcome = synthesizer.synthesize("When was Rust 1.0 released?", &context).await;
        assert_eq!(outcome, SynthesisOutcome::Answered("Rust 1.0 shipped in May 2015.".into()));

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests[0].temperature, 0.3);
        assert_eq!(requests[0].purpose, "synthesis");
        assert!(requests[0].user.starts_with("Context:\nTitle: Rust"));
        assert!(requests[0].user.ends_with("User Query: When was Rust 1.0 released?"));
        assert!(requests[0].system.contains("specific question"));
    }

    #[tokio::test]
    async fn test_refusal_is_distinct_from_failure() {
        let context = SearchOutcome::Found("Unrelated text".into());

        let refusing = Synthesizer::new(FakeGenerator::new(Some(
            "'I could not find a relevant answer in the provided information.'",
        )));
        let outcome = refusing.synthesize("question", &context).await;
        assert_eq!(outcome, SynthesisOutcome::NoAnswerInContext);
        assert_eq!(outcome.into_answer(), NO_ANSWER_MESSAGE);

        let failing = Synthesizer::new(FakeGenerator::new(None));
        let outcome = failing.synthesize("question", &context).await;
        assert_eq!(outcome, SynthesisOutcome::GenerationFailed);
        assert_eq!(outcome.into_answer(), GENERATION_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_summary_style_adds_instruction() {
        let generator = FakeGenerator::new(Some("Summary."));
        let synthesizer = Synthesizer::new(generator.clone()).with_max_tokens(512);

        let context = SearchOutcome::Found("a\n\nb".into());
        synthesizer.synthesize("Latest news on fusion power", &context).await;

        let requests = generator.requests.lock().unwrap();
        assert!(requests[0].system.contains("broad request"));
        assert_eq!(requests[0].max_tokens, Some(512));
    }

    #[test]
    fn test_answer_style() {
        assert_eq!(AnswerStyle::for_query("Give me an OVERVIEW"), AnswerStyle::Summary);
        assert_eq!(AnswerStyle::for_query("recent developments in rust"), AnswerStyle::Summary);
        assert_eq!(AnswerStyle::for_query("who wrote it?"), AnswerStyle::Direct);
    }
}
