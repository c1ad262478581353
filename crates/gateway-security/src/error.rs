//! Security error types.

use gateway_core::GatewayError;
use std::time::Duration;

/// Result type for security operations.
pub type Result<T> = std::result::Result<T, SecurityError>;

/// Bot-verification error code for a missing token
pub const MISSING_INPUT_RESPONSE: &str = "missing-input-response";
/// Bot-verification error code for a missing server secret
pub const MISSING_INPUT_SECRET: &str = "missing-input-secret";
/// Bot-verification error code when the verification service cannot be used
pub const INTERNAL_ERROR: &str = "internal-error";

/// Gatekeeper rejection or setup failure.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    /// Client exceeded its request window.
    #[error("Rate limit of {limit} requests exceeded, retry after {}s", retry_after.as_secs())]
    RateLimited {
        /// Whole seconds until the window closes, at least one
        retry_after: Duration,
        /// Configured requests per window
        limit: u64,
    },

    /// Bot-challenge token missing or rejected.
    #[error("Bot verification failed: {}", codes.join(", "))]
    BotVerification {
        /// Error codes reported by the verifier
        codes: Vec<String>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SecurityError {
    /// Create a bot verification error with a single code.
    pub fn bot(code: impl Into<String>) -> Self {
        Self::BotVerification {
            codes: vec![code.into()],
        }
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Get HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RateLimited { .. } => 429,
            Self::BotVerification { .. } => 403,
            Self::Config(_) => 500,
        }
    }
}

impl From<SecurityError> for GatewayError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::RateLimited { retry_after, limit } => {
                Self::rate_limit(retry_after, limit)
            }
            SecurityError::BotVerification { codes } => Self::bot_verification(codes),
            SecurityError::Config(message) => Self::configuration(message),
        }
    }
}
