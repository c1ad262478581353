//! HTTP forwarding executor.
//!
//! One shared `reqwest` client serves every endpoint. Each call:
//! 1. builds the provider-specific request for the endpoint's kind
//! 2. attaches credentials per the kind's auth strategy
//! 3. races the call (including the body read) against the timeout and the
//!    request's cancellation token
//! 4. normalizes a 2xx body to the OpenAI chat-completion shape
//!
//! It never retries; that belongs to the failover controller.

use crate::wire;
use async_trait::async_trait;
use gateway_core::{
    AuthStrategy, EndpointDescriptor, ForwardingExecutor, GatewayError, HealthProbe,
    InferenceRequest, ProviderError, ProviderResponse,
};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Longest slice of an upstream error body kept for diagnostics
const MAX_ERROR_BODY: usize = 512;

/// Executor settings
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Timeout for one provider call, body read included
    pub request_timeout: Duration,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Idle pooled connections kept per host
    pub pool_max_idle_per_host: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(3),
            pool_max_idle_per_host: 32,
        }
    }
}

impl ExecutorConfig {
    /// Set the request timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// `reqwest`-backed [`ForwardingExecutor`] and [`HealthProbe`]
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    config: ExecutorConfig,
}

impl HttpExecutor {
    /// Create an executor
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: ExecutorConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(concat!("edge-inference-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Executor settings
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn authorize(builder: RequestBuilder, endpoint: &EndpointDescriptor) -> RequestBuilder {
        let Some(credential) = endpoint.credential.as_ref() else {
            return builder;
        };
        match endpoint.kind.auth_strategy() {
            AuthStrategy::None => builder,
            AuthStrategy::Bearer => builder.bearer_auth(credential.expose_secret()),
            AuthStrategy::ApiKeyHeader(header) => builder.header(header, credential.expose_secret()),
        }
    }

    fn map_transport_error(endpoint: &EndpointDescriptor, err: &reqwest::Error, timeout: Duration) -> ProviderError {
        if err.is_timeout() {
            ProviderError::timeout(endpoint.provider_id.clone(), timeout)
        } else {
            ProviderError::network(endpoint.provider_id.clone(), err.to_string())
        }
    }

    /// Run `call` under `timeout`, abandoning it if `cancel` fires first
    async fn bounded<T, F>(
        endpoint: &EndpointDescriptor,
        timeout: Duration,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(provider = %endpoint.provider_id, "Provider call abandoned, request cancelled");
                Err(ProviderError::cancelled(endpoint.provider_id.clone()))
            }
            result = tokio::time::timeout(timeout, call) => {
                result.unwrap_or_else(|_| Err(ProviderError::timeout(endpoint.provider_id.clone(), timeout)))
            }
        }
    }

    async fn send_chat(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InferenceRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let wire = wire::build_request(endpoint.kind, request);
        let timeout = self.config.request_timeout;

        let mut builder = self.client.post(endpoint.url(&wire.path)).json(&wire.body);
        for (name, value) in wire.headers {
            builder = builder.header(name, value);
        }
        let builder = Self::authorize(builder, endpoint);

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_transport_error(endpoint, &e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
            warn!(
                provider = %endpoint.provider_id,
                status = status.as_u16(),
                "Provider returned error status"
            );
            return Err(ProviderError::status(
                endpoint.provider_id.clone(),
                status.as_u16(),
                snippet,
            ));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_decode() {
                ProviderError::decode(endpoint.provider_id.clone(), e.to_string())
            } else {
                Self::map_transport_error(endpoint, &e, timeout)
            }
        })?;

        let normalized = wire::normalize_response(endpoint.kind, &request.model, body)
            .map_err(|message| ProviderError::decode(endpoint.provider_id.clone(), message))?;
        Ok(ProviderResponse::new(normalized))
    }
}

#[async_trait]
impl ForwardingExecutor for HttpExecutor {
    async fn execute(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InferenceRequest,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled(endpoint.provider_id.clone()));
        }

        let started = Instant::now();
        let result = Self::bounded(
            endpoint,
            self.config.request_timeout,
            cancel,
            self.send_chat(endpoint, request),
        )
        .await;

        debug!(
            provider = %endpoint.provider_id,
            model = %request.model,
            latency_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Provider call finished"
        );
        result
    }
}

#[async_trait]
impl HealthProbe for HttpExecutor {
    async fn probe(&self, endpoint: &EndpointDescriptor, timeout: Duration) -> Result<Duration, ProviderError> {
        let url = endpoint.url(wire::probe_path(endpoint.kind));
        let started = Instant::now();

        let call = async {
            let mut builder = self.client.get(&url);
            if endpoint.kind == gateway_core::ProviderKind::Anthropic {
                builder = builder.header("anthropic-version", crate::anthropic::API_VERSION);
            }
            let response = Self::authorize(builder, endpoint)
                .send()
                .await
                .map_err(|e| Self::map_transport_error(endpoint, &e, timeout))?;

            let status = response.status();
            if status.is_success() {
                Ok(started.elapsed())
            } else {
                Err(ProviderError::status(
                    endpoint.provider_id.clone(),
                    status.as_u16(),
                    format!("probe {url} returned {status}"),
                ))
            }
        };

        // Probes are not tied to a client request; they only honor the timeout.
        Self::bounded(endpoint, timeout, &CancellationToken::new(), call).await
    }
}
