//! Background health monitor.
//!
//! Probes every configured endpoint on a fixed interval (first tick
//! immediately) and upserts one health record per provider. Probes run
//! concurrently, each under its own timeout, and one provider's failure never
//! affects the others' records.

use chrono::Utc;
use futures::future::join_all;
use gateway_core::{
    EndpointDescriptor, HealthProbe, HealthRecord, HealthStore, ProviderError, ProviderRegistry,
};
use gateway_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Health monitor settings
#[derive(Debug, Clone, Copy)]
pub struct HealthMonitorConfig {
    /// Time between probe rounds
    pub interval: Duration,
    /// Per-probe timeout
    pub probe_timeout: Duration,
    /// Consecutive failures before a healthy provider is marked unhealthy
    pub unhealthy_threshold: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
            unhealthy_threshold: 1,
        }
    }
}

/// Periodic prober; the only writer of health records
pub struct HealthMonitor {
    registry: Arc<ProviderRegistry>,
    probe: Arc<dyn HealthProbe>,
    store: HealthStore,
    config: HealthMonitorConfig,
    metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("providers", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HealthMonitor {
    /// Create a monitor over every endpoint in `registry`
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        probe: Arc<dyn HealthProbe>,
        store: HealthStore,
        config: HealthMonitorConfig,
    ) -> Self {
        Self {
            registry,
            probe,
            store,
            config,
            metrics: None,
        }
    }

    /// Export provider health as gauges
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Probe every endpoint once and return the records written.
    ///
    /// Providers whose record could not be written are missing from the result.
    pub async fn run_once(&self) -> Vec<HealthRecord> {
        let rounds = self
            .registry
            .endpoints()
            .iter()
            .map(|endpoint| self.check(endpoint));

        let records: Vec<HealthRecord> = join_all(rounds).await.into_iter().flatten().collect();
        let healthy = records.iter().filter(|r| r.healthy).count();
        debug!(
            probed = self.registry.len(),
            healthy,
            "Health check round complete"
        );
        records
    }

    async fn check(&self, endpoint: &EndpointDescriptor) -> Option<HealthRecord> {
        let id = &endpoint.provider_id;
        let timeout = self.config.probe_timeout;
        let outcome: Result<Duration, ProviderError> =
            match tokio::time::timeout(timeout, self.probe.probe(endpoint, timeout)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::timeout(id.clone(), timeout)),
            };

        let threshold = self.config.unhealthy_threshold.max(1);
        let now = Utc::now();
        let written = self
            .store
            .upsert(id, |previous| match &outcome {
                Ok(latency) => HealthRecord::healthy(id.clone(), *latency, now),
                Err(_) => {
                    let failures = previous.map_or(0, |p| p.consecutive_failures) + 1;
                    let was_healthy = previous.is_some_and(|p| p.healthy);
                    HealthRecord {
                        provider_id: id.clone(),
                        last_checked_at: now,
                        healthy: was_healthy && failures < threshold,
                        measured_latency_ms: previous.and_then(|p| p.measured_latency_ms),
                        consecutive_failures: failures,
                    }
                }
            })
            .await;

        if let Err(err) = &outcome {
            warn!(provider = %id, kind = %err.kind, error = %err, "Health probe failed");
        }

        match written {
            Ok(record) => {
                if let Some(metrics) = &self.metrics {
                    metrics.set_provider_health(id.as_str(), record.healthy);
                }
                Some(record)
            }
            Err(e) => {
                warn!(provider = %id, error = %e, "Failed to write health record");
                None
            }
        }
    }

    /// Probe on every interval tick until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            providers = self.registry.len(),
            interval_secs = self.config.interval.as_secs(),
            "Health monitor started"
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }

        info!("Health monitor stopped");
    }

    /// Run on a background task
    #[must_use]
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
