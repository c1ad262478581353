//! Prometheus metrics.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Gateway metrics, owned by one registry
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    attempts_total: IntCounterVec,
    failovers_total: IntCounter,
    gatekeeper_rejections_total: IntCounterVec,
    telemetry_write_failures_total: IntCounter,
    provider_latency_seconds: HistogramVec,
    provider_healthy: IntGaugeVec,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create and register every metric on a fresh registry
    ///
    /// # Errors
    /// Returns error if a metric cannot be created or registered
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("gateway".to_string()), None)?;

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Inference requests by outcome"),
            &["outcome"],
        )?;
        let attempts_total = IntCounterVec::new(
            Opts::new("provider_attempts_total", "Provider attempts by provider and status"),
            &["provider", "status"],
        )?;
        let failovers_total = IntCounter::new("failovers_total", "Attempts after a provider failure")?;
        let gatekeeper_rejections_total = IntCounterVec::new(
            Opts::new("gatekeeper_rejections_total", "Requests rejected before routing"),
            &["reason"],
        )?;
        let telemetry_write_failures_total = IntCounter::new(
            "telemetry_write_failures_total",
            "Inference log entries that could not be written",
        )?;
        let provider_latency_seconds = HistogramVec::new(
            HistogramOpts::new("provider_latency_seconds", "Provider call latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["provider"],
        )?;
        let provider_healthy = IntGaugeVec::new(
            Opts::new("provider_healthy", "Last probe outcome (1 = healthy)"),
            &["provider"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(failovers_total.clone()))?;
        registry.register(Box::new(gatekeeper_rejections_total.clone()))?;
        registry.register(Box::new(telemetry_write_failures_total.clone()))?;
        registry.register(Box::new(provider_latency_seconds.clone()))?;
        registry.register(Box::new(provider_healthy.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            attempts_total,
            failovers_total,
            gatekeeper_rejections_total,
            telemetry_write_failures_total,
            provider_latency_seconds,
            provider_healthy,
        })
    }

    /// Count a finished inbound request
    pub fn record_request(&self, outcome: &str) {
        self.requests_total.with_label_values(&[outcome]).inc();
    }

    /// Count one provider attempt and observe its latency
    pub fn record_attempt(&self, provider: &str, success: bool, latency: Duration) {
        let status = if success { "success" } else { "failed" };
        self.attempts_total.with_label_values(&[provider, status]).inc();
        self.provider_latency_seconds
            .with_label_values(&[provider])
            .observe(latency.as_secs_f64());
    }

    /// Count a failover to another provider
    pub fn record_failover(&self) {
        self.failovers_total.inc();
    }

    /// Count a gatekeeper rejection
    pub fn record_rejection(&self, reason: &str) {
        self.gatekeeper_rejections_total.with_label_values(&[reason]).inc();
    }

    /// Count a dropped or failed inference log write
    pub fn record_telemetry_failure(&self) {
        self.telemetry_write_failures_total.inc();
    }

    /// Publish the latest probe outcome
    pub fn set_provider_health(&self, provider: &str, healthy: bool) {
        self.provider_healthy
            .with_label_values(&[provider])
            .set(i64::from(healthy));
    }

    /// Current telemetry write failure count
    #[must_use]
    pub fn telemetry_failures(&self) -> u64 {
        self.telemetry_write_failures_total.get()
    }

    /// Render every metric in the Prometheus text format
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
