//! RouteForge Context Engine
//!
//! The query pipeline:
//! - Session window for uploaded documents
//! - Rule-based routing with a model-assisted fallback
//! - Context-grounded answer synthesis

pub mod engine;
pub mod router;
pub mod session;
pub mod synthesizer;

pub use engine::{Backends, ContextEngine, CAPABILITIES_MESSAGE};
pub use router::{Router, RoutingDecision, RoutingTier};
pub use session::SessionState;
pub use synthesizer::{AnswerStyle, SynthesisOutcome, Synthesizer};
