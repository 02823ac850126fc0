use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

// Metrics registry

static GATEWAY_CALLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gateway_calls_total",
        "Total number of gateway calls to external systems",
        &["system", "outcome"]
    )
    .unwrap()
});

static GATEWAY_CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "gateway_call_duration_seconds",
        "External call latency in seconds",
        &["system"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap()
});

static RATE_LIMIT_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rate_limit_rejections_total",
        "Calls rejected by a local rate-limit window",
        &["system", "window"]
    )
    .unwrap()
});

static DELIVERY_SUBMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "delivery_submissions_total",
        "Delivery submissions by outcome",
        &["outcome"]
    )
    .unwrap()
});

static DELIVERY_RETRIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "delivery_retries_total",
        "Delivery attempts driven by the retry sweep"
    )
    .unwrap()
});

static DELIVERY_RETRIES_EXHAUSTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "delivery_retries_exhausted_total",
        "Deliveries that exhausted their retry budget"
    )
    .unwrap()
});

static RECONCILIATION_FLAGGED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "reconciliation_flagged_total",
        "Deliveries flagged for manual reconciliation"
    )
    .unwrap()
});

static RECONCILIATION_MISMATCHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "reconciliation_mismatches_total",
        "Reconciliation checks that did not match partner statements"
    )
    .unwrap()
});

static COMPLIANCE_CHECKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "compliance_checks_total",
        "Compliance validations by standard and result",
        &["standard", "result"]
    )
    .unwrap()
});

pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn record_gateway_call(system: &str, outcome: &str, duration_seconds: f64) {
        GATEWAY_CALLS_TOTAL
            .with_label_values(&[system, outcome])
            .inc();
        GATEWAY_CALL_DURATION
            .with_label_values(&[system])
            .observe(duration_seconds);
    }

    pub fn record_rate_limit_rejection(system: &str, window: &str) {
        RATE_LIMIT_REJECTIONS_TOTAL
            .with_label_values(&[system, window])
            .inc();
    }

    pub fn record_delivery_submission(outcome: &str) {
        DELIVERY_SUBMISSIONS_TOTAL
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_delivery_retry() {
        DELIVERY_RETRIES_TOTAL.inc();
    }

    pub fn record_retries_exhausted() {
        DELIVERY_RETRIES_EXHAUSTED_TOTAL.inc();
    }

    pub fn record_reconciliation_flagged(count: u64) {
        RECONCILIATION_FLAGGED_TOTAL.inc_by(count);
    }

    pub fn record_reconciliation_mismatch() {
        RECONCILIATION_MISMATCHES_TOTAL.inc();
    }

    pub fn record_compliance_check(standard: &str, compliant: bool) {
        let result = if compliant { "compliant" } else { "non_compliant" };
        COMPLIANCE_CHECKS_TOTAL
            .with_label_values(&[standard, result])
            .inc();
    }

    /// Export all metrics in Prometheus format
    pub fn export() -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        encoder.encode_to_string(&metric_families)
    }
}
