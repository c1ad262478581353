//! Error taxonomy for the gateway.
//!
//! Every failure a request can hit maps onto one [`GatewayError`] variant,
//! and every variant has a fixed HTTP status and retry classification.
//! Only [`GatewayError::Provider`] is ever retried, and only by the
//! failover controller.

use crate::types::ProviderId;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the gateway crates
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Why a provider attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The call exceeded the executor timeout
    Timeout,
    /// The provider answered with a non-2xx status
    Status,
    /// Connection or transport failure
    Network,
    /// 2xx with a body we could not decode
    Decode,
    /// The inbound client went away and the call was abandoned
    Cancelled,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Status => write!(f, "status"),
            Self::Network => write!(f, "network"),
            Self::Decode => write!(f, "decode"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure of a single forwarding attempt.
///
/// `message` may contain upstream response text; it goes to telemetry and
/// logs only and is never rendered to the client.
#[derive(Debug, Clone, Error)]
#[error("provider {provider_id} failed ({kind}): {message}")]
pub struct ProviderError {
    /// Provider that failed
    pub provider_id: ProviderId,
    /// Upstream HTTP status, if one was received
    pub status: Option<u16>,
    /// Failure classification
    pub kind: ProviderErrorKind,
    /// Diagnostic message (internal only)
    pub message: String,
}

impl ProviderError {
    /// Upstream answered with a non-2xx status
    #[must_use]
    pub fn status(provider_id: ProviderId, status: u16, message: impl Into<String>) -> Self {
        Self {
            provider_id,
            status: Some(status),
            kind: ProviderErrorKind::Status,
            message: message.into(),
        }
    }

    /// Call timed out
    #[must_use]
    pub fn timeout(provider_id: ProviderId, after: Duration) -> Self {
        Self {
            provider_id,
            status: None,
            kind: ProviderErrorKind::Timeout,
            message: format!("no response within {}ms", after.as_millis()),
        }
    }

    /// Transport failure
    #[must_use]
    pub fn network(provider_id: ProviderId, message: impl Into<String>) -> Self {
        Self {
            provider_id,
            status: None,
            kind: ProviderErrorKind::Network,
            message: message.into(),
        }
    }

    /// Undecodable success body
    #[must_use]
    pub fn decode(provider_id: ProviderId, message: impl Into<String>) -> Self {
        Self {
            provider_id,
            status: None,
            kind: ProviderErrorKind::Decode,
            message: message.into(),
        }
    }

    /// Call abandoned because the client disconnected
    #[must_use]
    pub fn cancelled(provider_id: ProviderId) -> Self {
        Self {
            provider_id,
            status: None,
            kind: ProviderErrorKind::Cancelled,
            message: "request cancelled by client".to_string(),
        }
    }

    /// Whether this failure came from client cancellation
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == ProviderErrorKind::Cancelled
    }

    /// Short client-safe reason, e.g. `timeout` or `upstream_status_502`
    #[must_use]
    pub fn public_reason(&self) -> String {
        match (self.kind, self.status) {
            (ProviderErrorKind::Status, Some(code)) => format!("upstream_status_{code}"),
            (kind, _) => kind.to_string(),
        }
    }
}

/// Per-attempt failure summary aggregated into `ServiceUnavailable`
#[derive(Debug, Clone, Serialize)]
pub struct AttemptFailure {
    /// 1-based attempt number
    pub attempt: u32,
    /// Provider tried on this attempt
    pub provider: ProviderId,
    /// Client-safe failure reason
    pub reason: String,
}

impl AttemptFailure {
    /// Summarize a provider error for the client
    #[must_use]
    pub fn from_error(attempt: u32, error: &ProviderError) -> Self {
        Self {
            attempt,
            provider: error.provider_id.clone(),
            reason: error.public_reason(),
        }
    }
}

/// Main error type for the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or semantically invalid request body
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
        /// Offending field, if known
        field: Option<String>,
    },

    /// Bot-challenge token missing or rejected
    #[error("Bot verification failed")]
    BotVerification {
        /// Error codes reported by the verification service
        codes: Vec<String>,
    },

    /// Client exceeded its request window
    #[error("Rate limit exceeded")]
    RateLimit {
        /// Time until the current window closes
        retry_after: Duration,
        /// Configured requests per window
        limit: u64,
    },

    /// A single provider attempt failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// No provider could serve the request
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Summary message
        message: String,
        /// One entry per failed attempt
        attempts: Vec<AttemptFailure>,
    },

    /// Telemetry write failed; never surfaced to clients
    #[error("Telemetry write failed: {message}")]
    TelemetryWrite {
        /// Error message
        message: String,
    },

    /// Inbound client disconnected before completion
    #[error("Request cancelled")]
    Cancelled,

    /// Configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Shared store failure
    #[error("Store error: {message}")]
    Store {
        /// Error message
        message: String,
    },

    /// Anything else
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    /// Create a bot verification error
    #[must_use]
    pub fn bot_verification(codes: Vec<String>) -> Self {
        Self::BotVerification { codes }
    }

    /// Create a rate limit error
    #[must_use]
    pub fn rate_limit(retry_after: Duration, limit: u64) -> Self {
        Self::RateLimit { retry_after, limit }
    }

    /// Create a service unavailable error
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>, attempts: Vec<AttemptFailure>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
            attempts,
        }
    }

    /// Create a telemetry write error
    #[must_use]
    pub fn telemetry_write(message: impl Into<String>) -> Self {
        Self::TelemetryWrite {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::BotVerification { .. } => 403,
            Self::RateLimit { .. } => 429,
            Self::Provider(_) | Self::ServiceUnavailable { .. } => 503,
            // Client is gone; the status is only visible in access logs.
            Self::Cancelled => 499,
            Self::TelemetryWrite { .. }
            | Self::Configuration { .. }
            | Self::Store { .. }
            | Self::Internal { .. } => 500,
        }
    }

    /// Whether the failover controller may try another provider
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(e) if !e.is_cancelled())
    }

    /// Stable error code for logs and metrics
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::BotVerification { .. } => "bot_verification_error",
            Self::RateLimit { .. } => "rate_limit_error",
            Self::Provider(_) => "provider_error",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::TelemetryWrite { .. } => "telemetry_write_error",
            Self::Cancelled => "cancelled",
            Self::Configuration { .. } => "configuration_error",
            Self::Store { .. } => "store_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}
