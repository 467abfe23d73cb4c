//! RouteForge Retrieval
//!
//! Context retrieval for the routing pipeline:
//! - Document search over an in-memory semantic index
//! - Web search with a primary and a fallback provider
//! - Scholarly paper search over the arXiv Atom API
//!
//! Every backend returns a [`SearchOutcome`](routeforge_common::SearchOutcome)
//! and never an error.

pub mod index;
pub mod retrieval;

pub use index::{DocumentIndex, IndexReport, IndexSnapshot};
pub use retrieval::{
    DocumentStore, DuckDuckGoProvider, PaperSearch, RetrievalBackend, SerpApiProvider, WebHit,
    WebProvider, WebSearch,
};
