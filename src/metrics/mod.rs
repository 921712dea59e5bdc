//! Prometheus metrics for the search gateway and the reindex pipeline.
//!
//! Metrics live in a process-wide registry and are exported in the text
//! exposition format at `GET /metrics`.
//!
//! # Example
//! ```no_run
//! use dp_search_api::metrics::SEARCH_REQUESTS_TOTAL;
//!
//! SEARCH_REQUESTS_TOTAL
//!     .with_label_values(&["search", "200"])
//!     .inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::time::Instant;

const NAMESPACE: &str = "dp_search_api";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Search requests answered, by surface and HTTP status
    ///
    /// Labels: surface, status
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_requests_total", "Total number of search requests")
            .namespace(NAMESPACE),
        &["surface", "status"]
    ).expect("Failed to create SEARCH_REQUESTS_TOTAL metric");

    /// Elasticsearch call latency
    ///
    /// Labels: operation
    pub static ref ELASTICSEARCH_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "elasticsearch_request_duration_seconds",
            "Elasticsearch request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation"]
    ).expect("Failed to create ELASTICSEARCH_REQUEST_DURATION_SECONDS metric");

    /// Documents processed by reindex runs
    ///
    /// Labels: outcome (indexed, failed)
    pub static ref REINDEX_DOCUMENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("reindex_documents_total", "Total number of documents processed by reindex")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create REINDEX_DOCUMENTS_TOTAL metric");

    /// Application build info
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Application build information")
            .namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

/// Register every metric with the global registry.
///
/// Call once at startup; a second call fails with a duplicate registration.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(ELASTICSEARCH_REQUEST_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(REINDEX_DOCUMENTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BUILD_INFO.clone()))?;

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Times one Elasticsearch call; the observation is recorded on drop
pub struct EsTimer {
    operation: &'static str,
    started: Instant,
}

impl EsTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            started: Instant::now(),
        }
    }
}

impl Drop for EsTimer {
    fn drop(&mut self) {
        ELASTICSEARCH_REQUEST_DURATION_SECONDS
            .with_label_values(&[self.operation])
            .observe(self.started.elapsed().as_secs_f64());
    }
}

/// Generate Prometheus text format metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_counter() {
        SEARCH_REQUESTS_TOTAL
            .with_label_values(&["release", "400"])
            .inc();

        let value = SEARCH_REQUESTS_TOTAL
            .with_label_values(&["release", "400"])
            .get();
        assert!(value >= 1.0);
    }

    #[test]
    fn test_es_timer_observes_on_drop() {
        let before = ELASTICSEARCH_REQUEST_DURATION_SECONDS
            .with_label_values(&["test_op"])
            .get_sample_count();
        drop(EsTimer::start("test_op"));
        let after = ELASTICSEARCH_REQUEST_DURATION_SECONDS
            .with_label_values(&["test_op"])
            .get_sample_count();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_gather_metrics() {
        // Registration may already have happened in another test
        let _ = init_metrics();
        let metrics = gather_metrics();
        assert!(metrics.contains("dp_search_api_build_info"));
    }
}
