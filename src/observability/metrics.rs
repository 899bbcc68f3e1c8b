//! Metrics for the indexer.
//!
//! Recording goes through the `metrics` facade, so every call is a no-op until
//! [`init`] installs the Prometheus recorder.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// Enum representing all metric names used by the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingest metrics
    IngestDocumentsIndexed,
    IngestRowsSkipped,
    IngestValuesCoerced,
    IngestRunsAborted,
    IngestDuration,

    // Store metrics
    StoreRequestsSuccess,
    StoreRequestsError,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::IngestDocumentsIndexed => "indexer_ingest_documents_indexed_total",
            MetricName::IngestRowsSkipped => "indexer_ingest_rows_skipped_total",
            MetricName::IngestValuesCoerced => "indexer_ingest_values_coerced_total",
            MetricName::IngestRunsAborted => "indexer_ingest_runs_aborted_total",
            MetricName::IngestDuration => "indexer_ingest_duration_seconds",
            MetricName::StoreRequestsSuccess => "indexer_store_requests_success_total",
            MetricName::StoreRequestsError => "indexer_store_requests_error_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is harmless.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Current metrics in Prometheus text format, if the recorder is installed.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

// ============================================================================
// Ingest Metrics
// ============================================================================

pub mod ingest {
    use super::MetricName;

    pub fn document_indexed(collection: &str) {
        ::metrics::counter!(MetricName::IngestDocumentsIndexed.as_str(), "collection" => collection.to_string())
            .increment(1);
    }

    pub fn row_skipped(collection: &str) {
        ::metrics::counter!(MetricName::IngestRowsSkipped.as_str(), "collection" => collection.to_string())
            .increment(1);
    }

    pub fn values_coerced(count: usize) {
        ::metrics::counter!(MetricName::IngestValuesCoerced.as_str()).increment(count as u64);
    }

    pub fn run_aborted(kind: &str) {
        ::metrics::counter!(MetricName::IngestRunsAborted.as_str(), "kind" => kind.to_string()).increment(1);
    }

    pub fn run_duration(secs: f64) {
        ::metrics::histogram!(MetricName::IngestDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Store Metrics
// ============================================================================

pub mod store {
    use super::MetricName;

    pub fn request_success(operation: &'static str) {
        ::metrics::counter!(MetricName::StoreRequestsSuccess.as_str(), "operation" => operation).increment(1);
    }

    pub fn request_error(operation: &'static str, kind: &'static str) {
        ::metrics::counter!(
            MetricName::StoreRequestsError.as_str(),
            "operation" => operation,
            "kind" => kind
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_prefixed() {
        for name in [
            MetricName::IngestDocumentsIndexed,
            MetricName::IngestDuration,
            MetricName::StoreRequestsError,
        ] {
            assert!(name.to_string().starts_with("indexer_"));
        }
    }

    #[test]
    fn recording_without_recorder_is_a_noop() {
        ingest::document_indexed("employees");
        store::request_error("count", "connectivity");
    }
}
