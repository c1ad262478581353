//! HTTP error mapping.
//!
//! Every [`GatewayError`] renders as `{"error": <stable message>, "details": ...}`.
//! `details` carries only client-safe data; upstream bodies and internal
//! messages stay in the logs.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::GatewayError;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable, human-readable message
    pub error: &'static str,
    /// Client-safe specifics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl ApiError {
    /// The wrapped gateway error
    #[must_use]
    pub fn inner(&self) -> &GatewayError {
        &self.0
    }

    fn body(&self) -> ErrorBody {
        let (error, details) = match &self.0 {
            GatewayError::Validation { message, field } => (
                "invalid request",
                Some(json!({ "message": message, "field": field })),
            ),
            GatewayError::BotVerification { codes } => {
                ("bot verification failed", Some(json!({ "codes": codes })))
            }
            GatewayError::RateLimit { retry_after, limit } => (
                "rate limit exceeded",
                Some(json!({ "limit": limit, "retryAfterSecs": retry_after.as_secs() })),
            ),
            GatewayError::Provider(err) => (
                "provider error",
                Some(json!({ "provider": err.provider_id, "reason": err.public_reason() })),
            ),
            GatewayError::ServiceUnavailable { message, attempts } => (
                "service unavailable",
                Some(json!({ "message": message, "attempts": attempts })),
            ),
            GatewayError::Cancelled => ("request cancelled", None),
            GatewayError::TelemetryWrite { .. }
            | GatewayError::Configuration { .. }
            | GatewayError::Store { .. }
            | GatewayError::Internal { .. } => ("internal error", None),
        };
        ErrorBody { error, details }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(error = %self.0, error_type = self.0.error_type(), "Request failed");
        } else {
            warn!(error = %self.0, error_type = self.0.error_type(), "Request rejected");
        }

        let mut response = (status, Json(self.body())).into_response();
        if let GatewayError::RateLimit { retry_after, .. } = &self.0 {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after.as_secs().max(1)),
            );
        }
        response
    }
}
