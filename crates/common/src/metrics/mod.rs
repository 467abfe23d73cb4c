//! Metrics and observability utilities
//!
//! Prometheus metrics for the routing pipeline with standardized naming
//! conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Metrics prefix for all RouteForge metrics
pub const METRICS_PREFIX: &str = "routeforge";

/// Buckets for calls to external providers (in seconds)
/// Timeouts sit at 8-10s for search and 30s for generation
pub const EXTERNAL_CALL_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    4.000,  // 4s
    8.000,  // 8s - web fallback timeout
    10.00,  // 10s - search timeout
    30.00,  // 30s - generation timeout
];

/// Install the Prometheus recorder and return a handle for rendering
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            EXTERNAL_CALL_BUCKETS,
        )?
        .install_recorder()
}

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Queries routed, by agent and routing tier"
    );

    describe_counter!(
        format!("{}_backend_searches_total", METRICS_PREFIX),
        Unit::Count,
        "Backend searches, by backend and outcome"
    );

    describe_histogram!(
        format!("{}_backend_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Backend search latency in seconds"
    );

    describe_counter!(
        format!("{}_synthesis_total", METRICS_PREFIX),
        Unit::Count,
        "Synthesis attempts, by outcome"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Text generation latency in seconds"
    );

    describe_counter!(
        format!("{}_documents_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Documents indexed"
    );

    describe_counter!(
        format!("{}_chunks_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Document chunks indexed"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint,
            "status" => status.to_string()
        )
        .increment(1);

        tracing::trace!(latency_ms = self.start.elapsed().as_millis() as u64, "Request recorded");
    }
}

/// Record a routing decision
pub fn record_routing(agent: &str, tier: &str) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "agent" => agent.to_string(),
        "tier" => tier.to_string()
    )
    .increment(1);
}

/// Record one backend search
pub fn record_backend_search(duration_secs: f64, backend: &str, outcome: &str) {
    counter!(
        format!("{}_backend_searches_total", METRICS_PREFIX),
        "backend" => backend.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_backend_search_duration_seconds", METRICS_PREFIX),
        "backend" => backend.to_string(),
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}

/// Record a synthesis outcome
pub fn record_synthesis(outcome: &str) {
    counter!(
        format!("{}_synthesis_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record generation latency
pub fn record_generation(duration_secs: f64, purpose: &str) {
    histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        "purpose" => purpose.to_string()
    )
    .record(duration_secs);
}

/// Record an indexed document
pub fn record_document_indexed(chunks: usize) {
    counter!(format!("{}_documents_indexed_total", METRICS_PREFIX)).increment(1);
    counter!(format!("{}_chunks_indexed_total", METRICS_PREFIX)).increment(chunks as u64);
}
