//! Bot-challenge token verification.
//!
//! The gateway only interprets the verifier's pass/fail answer. Anything that
//! keeps us from getting an answer (network error, timeout, non-2xx, bad JSON)
//! is a failure with code `internal-error`.

use crate::error::{Result, SecurityError, INTERNAL_ERROR};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Answer from the verification service
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct VerificationResult {
    /// Whether the token was accepted
    pub success: bool,
    /// Reasons for rejection
    #[serde(default, rename = "error-codes")]
    pub error_codes: Vec<String>,
}

impl VerificationResult {
    /// Accepted token
    #[must_use]
    pub fn passed() -> Self {
        Self {
            success: true,
            error_codes: Vec::new(),
        }
    }

    /// Rejected token with one error code
    #[must_use]
    pub fn failed(code: impl Into<String>) -> Self {
        Self {
            success: false,
            error_codes: vec![code.into()],
        }
    }
}

/// Checks a bot-challenge token with an external service
#[async_trait]
pub trait BotVerifier: Send + Sync {
    /// Verify `token`, optionally bound to the client's IP
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> VerificationResult;
}

/// Cloudflare Turnstile `siteverify` client
#[derive(Clone)]
pub struct TurnstileVerifier {
    client: Client,
    verify_url: String,
    secret: SecretString,
}

impl std::fmt::Debug for TurnstileVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnstileVerifier")
            .field("verify_url", &self.verify_url)
            .finish_non_exhaustive()
    }
}

impl TurnstileVerifier {
    /// Create a verifier posting to `verify_url`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(verify_url: impl Into<String>, secret: SecretString, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SecurityError::config(format!("Failed to create verification client: {e}")))?;

        Ok(Self {
            client,
            verify_url: verify_url.into(),
            secret,
        })
    }
}

#[async_trait]
impl BotVerifier for TurnstileVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> VerificationResult {
        let mut form = vec![
            ("secret", self.secret.expose_secret().as_str()),
            ("response", token),
        ];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = match self.client.post(&self.verify_url).form(&form).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Bot verification service unreachable");
                return VerificationResult::failed(INTERNAL_ERROR);
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Bot verification service returned an error status");
            return VerificationResult::failed(INTERNAL_ERROR);
        }

        match response.json::<VerificationResult>().await {
            Ok(result) => {
                debug!(success = result.success, codes = ?result.error_codes, "Bot verification answered");
                result
            }
            Err(e) => {
                warn!(error = %e, "Malformed bot verification reply");
                VerificationResult::failed(INTERNAL_ERROR)
            }
        }
    }
}
