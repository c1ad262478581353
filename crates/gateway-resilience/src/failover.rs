//! Failover controller.
//!
//! Drives one request through `Attempting -> Waiting -> Retrying -> Exhausted`:
//! - every attempt takes a fresh health snapshot and asks the selector
//! - every attempt, good or bad, is handed to the attempt recorder
//! - a failed provider is excluded for the rest of the loop
//! - cancellation ends the loop immediately and is never retried
//!
//! Attempts are strictly sequential.

use crate::backoff::BackoffPolicy;
use crate::scheduler::{Scheduler, TokioScheduler};
use chrono::Utc;
use gateway_core::{
    AttemptFailure, AttemptRecorder, AttemptStatus, EndpointDescriptor, ForwardingExecutor,
    GatewayError, HealthStore, InferenceLogEntry, InferenceRequest, ProviderError, ProviderId,
    ProviderResponse, RequestContext,
};
use gateway_routing::RoutingSelector;
use gateway_telemetry::{estimate_cost, Metrics};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Failover settings
#[derive(Debug, Clone, Copy)]
pub struct FailoverConfig {
    /// Upper bound on provider attempts per request
    pub max_attempts: u32,
    /// Delay between attempts
    pub backoff: BackoffPolicy,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Position of a request in the failover loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverState {
    /// First attempt
    Attempting,
    /// Backing off after a failed attempt
    Waiting {
        /// Delay before the next attempt
        delay: Duration,
    },
    /// Any attempt after the first
    Retrying,
    /// No attempts or candidates left
    Exhausted,
}

/// Result of a successful failover loop
#[derive(Debug, Clone)]
pub struct FailoverOutcome {
    /// Normalized provider response
    pub response: ProviderResponse,
    /// Provider that answered
    pub provider: Arc<EndpointDescriptor>,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Time since the request started
    pub latency: Duration,
    /// Estimated cost of the successful attempt
    pub cost_usd: f64,
}

/// Bounded, sequential retries across selector and executor
pub struct FailoverController {
    selector: RoutingSelector,
    executor: Arc<dyn ForwardingExecutor>,
    health: HealthStore,
    recorder: Arc<dyn AttemptRecorder>,
    scheduler: Arc<dyn Scheduler>,
    metrics: Option<Arc<Metrics>>,
    config: FailoverConfig,
}

impl std::fmt::Debug for FailoverController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverController")
            .field("selector", &self.selector)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FailoverController {
    /// Create a controller using the tokio scheduler
    #[must_use]
    pub fn new(
        selector: RoutingSelector,
        executor: Arc<dyn ForwardingExecutor>,
        health: HealthStore,
        recorder: Arc<dyn AttemptRecorder>,
        config: FailoverConfig,
    ) -> Self {
        Self {
            selector,
            executor,
            health,
            recorder,
            scheduler: Arc::new(TokioScheduler),
            metrics: None,
            config,
        }
    }

    /// Replace the backoff scheduler
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Report attempts and failovers to `metrics`
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The selector used for every attempt
    #[must_use]
    pub fn selector(&self) -> &RoutingSelector {
        &self.selector
    }

    /// Serve `request`, failing over between providers.
    ///
    /// # Errors
    /// - `Cancelled` if the client went away
    /// - `ServiceUnavailable` when no attempt succeeded, listing each failure
    /// - `Store` if health records could not be read
    pub async fn run(
        &self,
        ctx: &mut RequestContext,
        request: &InferenceRequest,
    ) -> Result<FailoverOutcome, GatewayError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut excluded: HashSet<ProviderId> = HashSet::new();
        let mut failures: Vec<AttemptFailure> = Vec::new();
        let mut state = FailoverState::Attempting;

        loop {
            match state {
                FailoverState::Attempting | FailoverState::Retrying => {
                    if ctx.is_cancelled() {
                        return Err(GatewayError::Cancelled);
                    }

                    let snapshot = self.health.snapshot().await?;
                    let Some(endpoint) =
                        self.selector
                            .select(&request.model, ctx.strategy, &excluded, &snapshot)
                    else {
                        state = FailoverState::Exhausted;
                        continue;
                    };

                    let attempt = ctx.next_attempt();
                    if state == FailoverState::Retrying {
                        if let Some(metrics) = &self.metrics {
                            metrics.record_failover();
                        }
                    }

                    match self.attempt(ctx, request, &endpoint, attempt).await {
                        Ok(outcome) => return Ok(outcome),
                        Err(err) if err.is_cancelled() => return Err(GatewayError::Cancelled),
                        Err(err) => {
                            failures.push(AttemptFailure::from_error(attempt, &err));
                            excluded.insert(endpoint.provider_id.clone());

                            // No point backing off when nothing is left to try
                            state = if attempt >= max_attempts
                                || !self.has_candidate(ctx, request, &excluded).await?
                            {
                                FailoverState::Exhausted
                            } else {
                                FailoverState::Waiting {
                                    delay: self.config.backoff.delay_for_attempt(attempt),
                                }
                            };
                        }
                    }
                }
                FailoverState::Waiting { delay } => {
                    debug!(
                        request_id = %ctx.request_id,
                        delay_ms = delay.as_millis() as u64,
                        "Backing off before next attempt"
                    );
                    if !self.scheduler.sleep(delay, &ctx.cancel).await {
                        return Err(GatewayError::Cancelled);
                    }
                    state = FailoverState::Retrying;
                }
                FailoverState::Exhausted => {
                    let message = if failures.is_empty() {
                        format!("no provider available for model '{}'", request.model)
                    } else {
                        format!("all {} attempts failed", failures.len())
                    };
                    warn!(
                        request_id = %ctx.request_id,
                        model = %request.model,
                        attempts = failures.len(),
                        "Failover exhausted"
                    );
                    return Err(GatewayError::service_unavailable(message, failures));
                }
            }
        }
    }

    async fn has_candidate(
        &self,
        ctx: &RequestContext,
        request: &InferenceRequest,
        excluded: &HashSet<ProviderId>,
    ) -> Result<bool, GatewayError> {
        let snapshot = self.health.snapshot().await?;
        Ok(self
            .selector
            .select(&request.model, ctx.strategy, excluded, &snapshot)
            .is_some())
    }

    async fn attempt(
        &self,
        ctx: &RequestContext,
        request: &InferenceRequest,
        endpoint: &Arc<EndpointDescriptor>,
        attempt: u32,
    ) -> Result<FailoverOutcome, ProviderError> {
        let started = Instant::now();
        let result = self.executor.execute(endpoint, request, &ctx.cancel).await;
        let elapsed = started.elapsed();

        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(endpoint.provider_id.as_str(), result.is_ok(), elapsed);
        }

        match result {
            Ok(response) => {
                let cost_usd = estimate_cost(endpoint, response.usage.as_ref());
                self.recorder.record(self.log_entry(
                    ctx,
                    request,
                    endpoint,
                    attempt,
                    elapsed,
                    cost_usd,
                    None,
                ));
                info!(
                    request_id = %ctx.request_id,
                    provider = %endpoint.provider_id,
                    attempt,
                    latency_ms = elapsed.as_millis() as u64,
                    cost_usd,
                    "Provider attempt succeeded"
                );
                Ok(FailoverOutcome {
                    response,
                    provider: Arc::clone(endpoint),
                    attempts: attempt,
                    latency: ctx.started.elapsed(),
                    cost_usd,
                })
            }
            Err(err) => {
                self.recorder.record(self.log_entry(
                    ctx,
                    request,
                    endpoint,
                    attempt,
                    elapsed,
                    0.0,
                    Some(&err),
                ));
                warn!(
                    request_id = %ctx.request_id,
                    provider = %endpoint.provider_id,
                    attempt,
                    kind = %err.kind,
                    error = %err,
                    "Provider attempt failed"
                );
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn log_entry(
        &self,
        ctx: &RequestContext,
        request: &InferenceRequest,
        endpoint: &EndpointDescriptor,
        attempt: u32,
        elapsed: Duration,
        cost_usd: f64,
        error: Option<&ProviderError>,
    ) -> InferenceLogEntry {
        InferenceLogEntry {
            request_id: ctx.request_id,
            provider_id: endpoint.provider_id.clone(),
            model: request.model.clone(),
            cost_usd,
            latency_ms: elapsed.as_millis() as u64,
            status: if error.is_some() {
                AttemptStatus::Failed
            } else {
                AttemptStatus::Success
            },
            error_message: error.map(ToString::to_string),
            strategy: ctx.strategy,
            was_cached: false,
            attempt,
            timestamp: Utc::now(),
        }
    }
}
