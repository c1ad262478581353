//! Routing selector.
//!
//! Picks one endpoint for `(model, strategy, exclusions, health)`:
//! 1. a static model route, if that provider is still eligible
//! 2. otherwise the head of the strategy's preference order
//!
//! Eligibility always means: serves the model, not excluded in this failover
//! loop, and routable in the health snapshot (record present, healthy, fresh).

use crate::strategy::preference_order;
use gateway_core::{EndpointDescriptor, HealthSnapshot, ProviderId, ProviderRegistry, RoutingStrategy};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Selector settings
#[derive(Debug, Clone, Copy)]
pub struct SelectorConfig {
    /// Health records older than this are ignored
    pub health_freshness: Duration,
    /// Let `local-first` fall back to cloud providers
    pub allow_cloud_fallback: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            health_freshness: Duration::from_secs(300),
            allow_cloud_fallback: false,
        }
    }
}

/// Stateless, deterministic provider selector
#[derive(Debug, Clone)]
pub struct RoutingSelector {
    registry: Arc<ProviderRegistry>,
    config: SelectorConfig,
}

impl RoutingSelector {
    /// Create a selector over an immutable registry
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, config: SelectorConfig) -> Self {
        Self { registry, config }
    }

    /// The registry this selector reads
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Every eligible endpoint in preference order
    #[must_use]
    pub fn candidates(
        &self,
        model: &str,
        strategy: RoutingStrategy,
        excluded: &HashSet<ProviderId>,
        health: &HealthSnapshot,
    ) -> Vec<Arc<EndpointDescriptor>> {
        let routable: Vec<Arc<EndpointDescriptor>> = self
            .registry
            .supporting(model)
            .filter(|e| !excluded.contains(&e.provider_id))
            .filter(|e| health.is_routable(&e.provider_id, self.config.health_freshness))
            .cloned()
            .collect();

        preference_order(strategy, &routable, self.config.allow_cloud_fallback)
    }

    /// Pick one endpoint, or `None` when nothing is eligible
    #[must_use]
    pub fn select(
        &self,
        model: &str,
        strategy: RoutingStrategy,
        excluded: &HashSet<ProviderId>,
        health: &HealthSnapshot,
    ) -> Option<Arc<EndpointDescriptor>> {
        let ordered = self.candidates(model, strategy, excluded, health);

        if let Some(pinned) = self.registry.static_route(model) {
            if ordered.iter().any(|e| e.provider_id == pinned.provider_id) {
                debug!(model, provider = %pinned.provider_id, "Static route selected");
                return Some(Arc::clone(pinned));
            }
            debug!(model, provider = %pinned.provider_id, "Static route not eligible, using strategy order");
        }

        let chosen = ordered.into_iter().next();
        match &chosen {
            Some(endpoint) => {
                debug!(model, strategy = %strategy, provider = %endpoint.provider_id, "Provider selected");
            }
            None => {
                debug!(model, strategy = %strategy, excluded = excluded.len(), "No eligible provider");
            }
        }
        chosen
    }
}
