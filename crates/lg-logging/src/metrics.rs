//! Prometheus counters for the governance engine.
//!
//! ## Metrics
//!
//! - `lg_records_processed_total`: records that entered the engine
//! - `lg_violations_total`: well-formed violations observed
//! - `lg_fields_redacted_total`: fields overwritten with the marker
//! - `lg_policy_fail_open_total`: policy loads that degraded to an empty set, by status

use lg_redact::{MetricsSink, PolicyStatus};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Prometheus-backed [`MetricsSink`].
#[derive(Clone)]
pub struct PrometheusMetrics {
    pub registry: Registry,
    pub records_processed: IntCounter,
    pub violations: IntCounter,
    pub fields_redacted: IntCounter,
    pub policy_fail_open: IntCounterVec,
}

impl PrometheusMetrics {
    /// Create the counters in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Create the counters in an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let records_processed = IntCounter::with_opts(Opts::new(
            "lg_records_processed_total",
            "Log records that entered the governance engine",
        ))?;
        registry.register(Box::new(records_processed.clone()))?;

        let violations = IntCounter::with_opts(Opts::new(
            "lg_violations_total",
            "Governance violations observed on log records",
        ))?;
        registry.register(Box::new(violations.clone()))?;

        let fields_redacted = IntCounter::with_opts(Opts::new(
            "lg_fields_redacted_total",
            "Log record fields overwritten with the redaction marker",
        ))?;
        registry.register(Box::new(fields_redacted.clone()))?;

        let policy_fail_open = IntCounterVec::new(
            Opts::new(
                "lg_policy_fail_open_total",
                "Policy loads that fell back to an empty redact set",
            ),
            &["status"],
        )?;
        registry.register(Box::new(policy_fail_open.clone()))?;

        Ok(Self {
            registry,
            records_processed,
            violations,
            fields_redacted,
            policy_fail_open,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl MetricsSink for PrometheusMetrics {
    fn increment_processed(&self) {
        self.records_processed.inc();
    }

    fn increment_violations(&self, count: u64) {
        self.violations.inc_by(count);
    }

    fn increment_redactions(&self, count: u64) {
        self.fields_redacted.inc_by(count);
    }

    fn record_policy_fail_open(&self, status: PolicyStatus) {
        self.policy_fail_open
            .with_label_values(&[&status.to_string()])
            .inc();
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics")
            .field("records_processed", &self.records_processed.get())
            .field("violations", &self.violations.get())
            .field("fields_redacted", &self.fields_redacted.get())
            .finish()
    }
}
