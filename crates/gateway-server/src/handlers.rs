//! HTTP request handlers for the gateway API.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::{GatewayError, InferenceRequest, RequestContext};
use gateway_resilience::FailoverOutcome;
use gateway_security::Admission;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::{
    error::ApiError,
    extractors::{Client, RequestId, REQUEST_ID_HEADER},
    state::AppState,
};

/// Provider that served the request
pub const PROVIDER_USED_HEADER: &str = "x-provider-used";
/// End-to-end latency in milliseconds
pub const LATENCY_HEADER: &str = "x-latency-ms";
/// Estimated cost in USD
pub const COST_HEADER: &str = "x-cost-usd";
/// Attempts used, including the successful one
pub const ATTEMPT_HEADER: &str = "x-attempt";

/// Chat completion endpoint (OpenAI compatible).
///
/// Dropping this future (client disconnect) cancels the request token, which
/// abandons any in-flight provider call.
#[instrument(skip_all, fields(request_id = %request_id.0, client = %client.0))]
pub async fn chat_completion(
    State(state): State<AppState>,
    request_id: RequestId,
    client: Client,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let RequestId(request_id) = request_id;
    let Client(client) = client;

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let result = serve_chat(&state, request_id, client, uri.path(), &headers, &body, cancel).await;

    let mut response = match result {
        Ok(outcome) => {
            state.metrics.record_request("success");
            success_response(outcome)
        }
        Err(err) => {
            state.metrics.record_request(err.error_type());
            ApiError::from(err).into_response()
        }
    };
    set_header(&mut response, REQUEST_ID_HEADER, &request_id.to_string());
    response
}

async fn serve_chat(
    state: &AppState,
    request_id: gateway_core::RequestId,
    client: gateway_core::ClientKey,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
    cancel: CancellationToken,
) -> Result<FailoverOutcome, GatewayError> {
    // The token may live in the body, so parse leniently before the gatekeeper
    // and strictly after it.
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let empty = Value::Null;

    let token = state.gatekeeper.token(headers, parsed.as_ref().unwrap_or(&empty));
    state
        .gatekeeper
        .admit(&Admission {
            client: &client,
            path,
            token,
        })
        .await?;

    let value = parsed
        .ok_or_else(|| GatewayError::validation("request body must be valid JSON", None))?;
    let request = InferenceRequest::from_json(value, &[state.gatekeeper.token_field()])?;
    let strategy = request.strategy.unwrap_or_else(|| state.default_strategy());

    debug!(
        model = %request.model,
        strategy = %strategy,
        messages = request.messages.len(),
        "Processing chat completion request"
    );

    let mut ctx = RequestContext::new(request_id, client, &request.model, strategy, cancel);
    let outcome = state.failover.run(&mut ctx, &request).await?;

    info!(
        model = %request.model,
        provider = %outcome.provider.provider_id,
        attempts = outcome.attempts,
        latency_ms = outcome.latency.as_millis() as u64,
        cost_usd = outcome.cost_usd,
        "Chat completion served"
    );
    Ok(outcome)
}

fn success_response(outcome: FailoverOutcome) -> Response {
    let mut response = (StatusCode::OK, Json(outcome.response.body)).into_response();
    set_header(&mut response, PROVIDER_USED_HEADER, outcome.provider.provider_id.as_str());
    set_header(
        &mut response,
        LATENCY_HEADER,
        &outcome.latency.as_millis().to_string(),
    );
    set_header(&mut response, COST_HEADER, &format!("{:.6}", outcome.cost_usd));
    set_header(&mut response, ATTEMPT_HEADER, &outcome.attempts.to_string());
    response
}

fn set_header(response: &mut Response, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
}

/// Per-provider entry of the health response
#[derive(Debug, Serialize)]
pub struct ProviderHealth {
    /// Routable right now
    pub healthy: bool,
    /// Latency of the last successful probe
    pub latency_ms: Option<u64>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, `degraded` or `unhealthy`
    pub status: &'static str,
    /// Health by provider id
    pub providers: BTreeMap<String, ProviderHealth>,
}

/// Aggregate provider health; 503 when no provider is healthy
pub async fn health_check(State(state): State<AppState>) -> Response {
    let snapshot = match state.health.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(error = %e, "Failed to read health records");
            let body = HealthResponse {
                status: "unhealthy",
                providers: BTreeMap::new(),
            };
            return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
        }
    };

    let freshness = state.health_freshness();
    let providers: BTreeMap<String, ProviderHealth> = state
        .registry
        .endpoints()
        .iter()
        .map(|endpoint| {
            let id = &endpoint.provider_id;
            let health = ProviderHealth {
                healthy: snapshot.is_routable(id, freshness),
                latency_ms: snapshot.get(id).and_then(|r| r.measured_latency_ms),
            };
            (id.to_string(), health)
        })
        .collect();

    let healthy = providers.values().filter(|p| p.healthy).count();
    let status = if healthy == 0 {
        "unhealthy"
    } else if healthy == providers.len() {
        "healthy"
    } else {
        "degraded"
    };
    let code = if healthy == 0 {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (code, Json(HealthResponse { status, providers })).into_response()
}

/// Liveness check endpoint
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "alive" })))
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.gather() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// List models endpoint (OpenAI compatible)
pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    let data: Vec<Value> = state
        .registry
        .models()
        .into_iter()
        .map(|(model, provider)| {
            json!({
                "id": model,
                "object": "model",
                "owned_by": provider,
            })
        })
        .collect();

    Json(json!({ "object": "list", "data": data }))
}
