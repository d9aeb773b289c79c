//! Prometheus metrics for the gateway.
//!
//! Tracks call outcomes, backend latency, mock delays and auto-provisioning.
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Encoder, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Total number of gateway calls by outcome
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "moxy_requests_total",
        "Total number of calls handled by the gateway",
        &["kind", "outcome"]  // kind: soap|rest, outcome: live|mock|replay|<error kind>
    )
    .unwrap();

    /// Backend round-trip duration
    pub static ref BACKEND_DURATION_MS: HistogramVec = register_histogram_vec!(
        "moxy_backend_duration_ms",
        "Duration of backend calls in milliseconds",
        &["kind"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]
    )
    .unwrap();

    /// Artificial delay applied before releasing mock responses
    pub static ref MOCK_DELAY_MS: Histogram = register_histogram!(
        "moxy_mock_delay_ms",
        "Histogram of applied mock delays in milliseconds",
        vec![0.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap();

    /// Services created on a first unmatched request
    pub static ref SERVICES_AUTO_CREATED_TOTAL: Counter = register_counter!(
        "moxy_services_auto_created_total",
        "Total number of services auto-provisioned"
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_request(kind: &str, outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[kind, outcome]).inc();
}

pub fn record_backend_duration(kind: &str, duration_ms: f64) {
    BACKEND_DURATION_MS
        .with_label_values(&[kind])
        .observe(duration_ms);
}

pub fn record_mock_delay(delay_ms: u64) {
    MOCK_DELAY_MS.observe(delay_ms as f64);
}

pub fn record_service_auto_created() {
    SERVICES_AUTO_CREATED_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        record_request("soap", "live");
        record_request("rest", "backendTimeout");
        record_backend_duration("soap", 12.5);

        let metrics = collect_metrics();
        assert!(metrics.contains("moxy_requests_total"));
        assert!(metrics.contains("moxy_backend_duration_ms"));
    }

    #[test]
    fn test_mock_and_provisioning_metrics() {
        record_mock_delay(250);
        record_mock_delay(10_000);
        record_service_auto_created();

        let metrics = collect_metrics();
        assert!(metrics.contains("moxy_mock_delay_ms"));
        assert!(metrics.contains("moxy_services_auto_created_total"));
    }
}
