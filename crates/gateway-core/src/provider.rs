//! Provider descriptors and the executor/probe seams.
//!
//! An [`EndpointDescriptor`] is built once from configuration and never
//! mutated. Its [`ProviderKind`] fixes the wire protocol: request path, auth
//! header scheme, and response shape.

use crate::error::ProviderError;
use crate::request::InferenceRequest;
use crate::response::ProviderResponse;
use crate::types::ProviderId;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Kind of backend behind an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Self-hosted Ollama (OpenAI-compatible endpoint, no auth)
    Ollama,
    /// Any OpenAI-compatible cloud API (OpenAI, Groq, Together, ...)
    OpenaiCompatible,
    /// Anthropic Messages API
    Anthropic,
    /// Cloudflare Workers AI REST API
    WorkersAi,
}

impl ProviderKind {
    /// Whether the provider runs on our own hardware
    #[must_use]
    pub fn is_self_hosted(&self) -> bool {
        matches!(self, Self::Ollama)
    }

    /// Authentication scheme used when calling the provider
    #[must_use]
    pub fn auth_strategy(&self) -> AuthStrategy {
        match self {
            Self::Ollama => AuthStrategy::None,
            Self::OpenaiCompatible | Self::WorkersAi => AuthStrategy::Bearer,
            Self::Anthropic => AuthStrategy::ApiKeyHeader("x-api-key"),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenaiCompatible => write!(f, "openai_compatible"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::WorkersAi => write!(f, "workers_ai"),
        }
    }
}

/// How credentials are attached to provider requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// No credentials
    None,
    /// `Authorization: Bearer <key>`
    Bearer,
    /// Key sent verbatim in the named header
    ApiKeyHeader(&'static str),
}

/// Static description of one provider endpoint
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    /// Provider identifier
    pub provider_id: ProviderId,
    /// Wire protocol
    pub kind: ProviderKind,
    /// Base URL without trailing slash
    pub base_url: String,
    /// Models this endpoint serves
    pub supported_models: Vec<String>,
    /// USD per 1K tokens; zero for self-hosted
    pub unit_cost: f64,
    /// Typical latency used for latency-ordered routing
    pub avg_latency_ms: u64,
    /// Capability tier, 1 = most capable
    pub priority_tier: u8,
    /// Credential, when the auth strategy needs one
    pub credential: Option<SecretString>,
}

impl EndpointDescriptor {
    /// Create a descriptor with no models, zero cost, and no credential
    #[must_use]
    pub fn new(provider_id: impl Into<ProviderId>, kind: ProviderKind, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            provider_id: provider_id.into(),
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            supported_models: Vec::new(),
            unit_cost: 0.0,
            avg_latency_ms: 1_000,
            priority_tier: 3,
            credential: None,
        }
    }

    /// Add a supported model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.supported_models.push(model.into());
        self
    }

    /// Set supported models
    #[must_use]
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Set unit cost (USD per 1K tokens)
    #[must_use]
    pub fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    /// Set average latency
    #[must_use]
    pub fn with_avg_latency_ms(mut self, avg_latency_ms: u64) -> Self {
        self.avg_latency_ms = avg_latency_ms;
        self
    }

    /// Set capability tier
    #[must_use]
    pub fn with_priority_tier(mut self, priority_tier: u8) -> Self {
        self.priority_tier = priority_tier;
        self
    }

    /// Set the credential
    #[must_use]
    pub fn with_credential(mut self, credential: SecretString) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Whether this endpoint serves `model`
    #[must_use]
    pub fn supports(&self, model: &str) -> bool {
        self.supported_models.iter().any(|m| m == model)
    }

    /// Whether the endpoint is self-hosted
    #[must_use]
    pub fn is_self_hosted(&self) -> bool {
        self.kind.is_self_hosted()
    }

    /// Absolute URL for a provider-relative path
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Issues one provider call for a normalized request.
///
/// Implementations build the provider-specific request, apply a bounded
/// timeout, and abandon the call when `cancel` fires. They never retry.
#[async_trait]
pub trait ForwardingExecutor: Send + Sync {
    /// Forward `request` to `endpoint`
    async fn execute(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InferenceRequest,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError>;
}

/// Lightweight liveness check against one endpoint
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe `endpoint`, returning the measured round-trip time
    async fn probe(&self, endpoint: &EndpointDescriptor, timeout: Duration) -> Result<Duration, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builder() {
        let endpoint = EndpointDescriptor::new("local", ProviderKind::Ollama, "http://localhost:11434/")
            .with_models(["llama3.2", "mistral"])
            .with_avg_latency_ms(800);

        assert_eq!(endpoint.base_url, "http://localhost:11434");
        assert_eq!(endpoint.url("/v1/chat/completions"), "http://localhost:11434/v1/chat/completions");
        assert!(endpoint.supports("llama3.2"));
        assert!(!endpoint.supports("gpt-4o"));
        assert!(endpoint.is_self_hosted());
    }

    #[test]
    fn test_auth_strategy_per_kind() {
        assert_eq!(ProviderKind::Ollama.auth_strategy(), AuthStrategy::None);
        assert_eq!(ProviderKind::OpenaiCompatible.auth_strategy(), AuthStrategy::Bearer);
        assert_eq!(ProviderKind::WorkersAi.auth_strategy(), AuthStrategy::Bearer);
        assert_eq!(
            ProviderKind::Anthropic.auth_strategy(),
            AuthStrategy::ApiKeyHeader("x-api-key")
        );
        assert!(!ProviderKind::Anthropic.is_self_hosted());
    }

    #[test]
    fn test_kind_serde_names() {
        let kind: ProviderKind = serde_json::from_str("\"workers_ai\"").unwrap();
        assert_eq!(kind, ProviderKind::WorkersAi);
        assert_eq!(ProviderKind::OpenaiCompatible.to_string(), "openai_compatible");
    }
}
