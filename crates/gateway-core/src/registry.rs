//! Immutable provider registry.

use crate::provider::EndpointDescriptor;
use crate::types::ProviderId;
use std::collections::HashMap;
use std::sync::Arc;

/// All configured endpoints plus static model routes.
///
/// Built once at startup. Iteration follows declaration order, which is the
/// tie-breaker for every routing strategy.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    endpoints: Vec<Arc<EndpointDescriptor>>,
    index: HashMap<ProviderId, usize>,
    model_routes: HashMap<String, ProviderId>,
}

impl ProviderRegistry {
    /// Create a registry from endpoints in declaration order.
    ///
    /// A later endpoint with a duplicate id is ignored.
    #[must_use]
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Self {
        let mut registry = Self::default();
        for endpoint in endpoints {
            if registry.index.contains_key(&endpoint.provider_id) {
                tracing::warn!(provider = %endpoint.provider_id, "Duplicate provider id ignored");
                continue;
            }
            registry
                .index
                .insert(endpoint.provider_id.clone(), registry.endpoints.len());
            registry.endpoints.push(Arc::new(endpoint));
        }
        registry
    }

    /// Add static model → provider routes
    #[must_use]
    pub fn with_model_routes(mut self, routes: HashMap<String, ProviderId>) -> Self {
        self.model_routes = routes;
        self
    }

    /// Look up an endpoint by id
    #[must_use]
    pub fn get(&self, id: &ProviderId) -> Option<&Arc<EndpointDescriptor>> {
        self.index.get(id).map(|&i| &self.endpoints[i])
    }

    /// All endpoints in declaration order
    #[must_use]
    pub fn endpoints(&self) -> &[Arc<EndpointDescriptor>] {
        &self.endpoints
    }

    /// Declaration position of a provider
    #[must_use]
    pub fn position(&self, id: &ProviderId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Statically mapped provider for a model, if any
    #[must_use]
    pub fn static_route(&self, model: &str) -> Option<&Arc<EndpointDescriptor>> {
        self.model_routes.get(model).and_then(|id| self.get(id))
    }

    /// Endpoints that serve `model`, in declaration order
    pub fn supporting<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a Arc<EndpointDescriptor>> + 'a {
        self.endpoints.iter().filter(move |e| e.supports(model))
    }

    /// Distinct model names across all endpoints, first-seen order
    #[must_use]
    pub fn models(&self) -> Vec<(&str, &ProviderId)> {
        let mut seen = std::collections::HashSet::new();
        self.endpoints
            .iter()
            .flat_map(|e| e.supported_models.iter().map(move |m| (m.as_str(), &e.provider_id)))
            .filter(|(m, _)| seen.insert(*m))
            .collect()
    }

    /// Number of endpoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether no endpoint is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
