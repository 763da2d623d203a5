use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Instant;

use crate::{GatewayError, Result};

lazy_static! {
    pub static ref GATEWAY_UP: IntGauge = register_int_gauge!(
        "gateway_up",
        "Whether the gateway is serving requests (1) or not (0)"
    ).unwrap();

    // Request metrics
    pub static ref REQUEST_COUNTER: IntCounterVec = register_int_counter_vec!(
        "gateway_requests_total",
        "Total number of requests received",
        &["endpoint"]
    ).unwrap();

    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "gateway_request_duration_seconds",
        "Request duration in seconds",
        &["endpoint"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]
    ).unwrap();

    // Document store metrics
    pub static ref STORE_OPERATIONS: IntCounterVec = register_int_counter_vec!(
        "gateway_store_operations_total",
        "Total number of document store calls",
        &["operation"]
    ).unwrap();

    pub static ref STORE_FAILURES: IntCounterVec = register_int_counter_vec!(
        "gateway_store_failures_total",
        "Total number of failed document store calls",
        &["operation"]
    ).unwrap();

    pub static ref EMPTY_METRIC_RESULTS: IntCounter = register_int_counter!(
        "gateway_empty_metric_results_total",
        "Metrics answered with an empty result"
    ).unwrap();
}

pub fn init_metrics() {
    GATEWAY_UP.set(1);
}

/// Counts a request on creation and records its duration when dropped.
pub struct RequestTimer {
    endpoint: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(endpoint: &'static str) -> Self {
        REQUEST_COUNTER.with_label_values(&[endpoint]).inc();
        Self {
            endpoint,
            start: Instant::now(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        REQUEST_DURATION
            .with_label_values(&[self.endpoint])
            .observe(duration);
    }
}

pub fn record_store_operation(operation: &str) {
    STORE_OPERATIONS.with_label_values(&[operation]).inc();
}

pub fn record_store_failure(operation: &str) {
    STORE_FAILURES.with_label_values(&[operation]).inc();
}

pub fn record_empty_metric() {
    EMPTY_METRIC_RESULTS.inc();
}

/// Renders every registered collector in the Prometheus text format.
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| GatewayError::Internal(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| GatewayError::Internal(format!("Metrics are not valid UTF-8: {}", e)))
}
