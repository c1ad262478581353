//! Shared application state.

use gateway_config::GatewayConfig;
use gateway_core::{
    ForwardingExecutor, GatewayError, HealthStore, KeyValueStore, MemoryStore, ProviderRegistry,
    RoutingStrategy,
};
use gateway_providers::{ExecutorConfig, HttpExecutor};
use gateway_resilience::{BackoffPolicy, FailoverConfig, FailoverController, Scheduler};
use gateway_routing::{RoutingSelector, SelectorConfig};
use gateway_security::{BotVerifier, Gatekeeper, TrustedProxies};
use gateway_telemetry::{Metrics, TelemetryLogger};
use std::sync::Arc;
use std::time::Duration;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<GatewayConfig>,
    /// Immutable provider registry
    pub registry: Arc<ProviderRegistry>,
    /// Health records, read by `/health`
    pub health: HealthStore,
    /// Rate limiter and bot verifier
    pub gatekeeper: Arc<Gatekeeper>,
    /// Proxies allowed to name the client
    pub trusted_proxies: Arc<TrustedProxies>,
    /// Selector plus executor loop
    pub failover: Arc<FailoverController>,
    /// Inference log writer
    pub telemetry: TelemetryLogger,
    /// Prometheus metrics
    pub metrics: Arc<Metrics>,
    /// Shared store
    pub store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("providers", &self.registry.len())
            .field("store", &self.store.name())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create a new state builder
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    /// Strategy applied when the request names none
    #[must_use]
    pub fn default_strategy(&self) -> RoutingStrategy {
        self.config.routing.default_strategy
    }

    /// Freshness window for health records
    #[must_use]
    pub fn health_freshness(&self) -> Duration {
        self.config.routing.health_freshness
    }
}

/// Builder for [`AppState`]; everything not set is derived from the config
#[derive(Default)]
pub struct AppStateBuilder {
    config: GatewayConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    registry: Option<ProviderRegistry>,
    executor: Option<Arc<dyn ForwardingExecutor>>,
    verifier: Option<Arc<dyn BotVerifier>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    telemetry: Option<TelemetryLogger>,
    metrics: Option<Arc<Metrics>>,
}

impl AppStateBuilder {
    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the shared store (default: in-memory)
    #[must_use]
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the registry (default: built from the config and process env)
    #[must_use]
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the forwarding executor (default: HTTP executor)
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn ForwardingExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the bot verifier (default: Turnstile when a secret is configured)
    #[must_use]
    pub fn verifier(mut self, verifier: Arc<dyn BotVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Set the failover backoff scheduler (default: tokio timers)
    #[must_use]
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Set the inference log writer (default: spawned over the store)
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryLogger) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Set the metrics registry
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the state. Must run inside a tokio runtime when no telemetry
    /// logger was supplied.
    ///
    /// # Errors
    /// Returns error if the metrics registry or an HTTP client cannot be created
    pub fn build(self) -> Result<AppState, GatewayError> {
        let config = self.config;
        let store = self
            .store
            .unwrap_or_else(|| {
                Arc::new(MemoryStore::with_list_capacity(config.telemetry.max_log_entries))
                    as Arc<dyn KeyValueStore>
            });

        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(
                Metrics::new()
                    .map_err(|e| GatewayError::internal(format!("Failed to create metrics: {e}")))?,
            ),
        };

        let trusted_proxies = TrustedProxies::parse(&config.server.trusted_proxies)?;

        let registry = Arc::new(self.registry.unwrap_or_else(|| config.provider_registry()));

        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(HttpExecutor::new(
                ExecutorConfig::default().with_request_timeout(config.routing.request_timeout),
            )?) as Arc<dyn ForwardingExecutor>,
        };

        let gatekeeper = match self.verifier {
            Some(verifier) => Gatekeeper::new(Arc::clone(&store), &config.gatekeeper, Some(verifier)),
            None => Gatekeeper::from_config(
                Arc::clone(&store),
                &config.gatekeeper,
                config.verification_secret(|var| std::env::var(var).ok()),
            )?,
        }
        .with_metrics(Arc::clone(&metrics));

        let telemetry = match self.telemetry {
            Some(telemetry) => telemetry,
            None => {
                TelemetryLogger::spawn(
                    Arc::clone(&store),
                    config.telemetry.channel_capacity,
                    Some(Arc::clone(&metrics)),
                )
                .0
            }
        };

        let health = HealthStore::new(Arc::clone(&store));
        let selector = RoutingSelector::new(
            Arc::clone(&registry),
            SelectorConfig {
                health_freshness: config.routing.health_freshness,
                allow_cloud_fallback: config.routing.allow_cloud_fallback,
            },
        );
        let failover_config = FailoverConfig {
            max_attempts: config.routing.max_attempts,
            backoff: BackoffPolicy::new(config.routing.base_delay, config.routing.max_delay),
        };

        let mut failover = FailoverController::new(
            selector,
            executor,
            health.clone(),
            Arc::new(telemetry.clone()),
            failover_config,
        )
        .with_metrics(Arc::clone(&metrics));
        if let Some(scheduler) = self.scheduler {
            failover = failover.with_scheduler(scheduler);
        }

        Ok(AppState {
            config: Arc::new(config),
            registry,
            health,
            gatekeeper: Arc::new(gatekeeper),
            trusted_proxies: Arc::new(trusted_proxies),
            failover: Arc::new(failover),
            telemetry,
            metrics,
            store,
        })
    }
}
