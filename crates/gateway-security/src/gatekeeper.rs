//! Request gatekeeper.
//!
//! Runs before any routing decision, in a fixed order:
//! 1. per-client fixed-window rate limit
//! 2. bot-challenge verification on protected paths
//!
//! Both rejections are terminal, recorded as security events, and counted.

use crate::bot_verification::{BotVerifier, TurnstileVerifier};
use crate::error::{Result, SecurityError, MISSING_INPUT_RESPONSE, MISSING_INPUT_SECRET};
use crate::rate_limit::{FixedWindowRateLimiter, RateDecision};
use gateway_config::{BotVerificationConfig, GatekeeperConfig, MissingSecretPolicy};
use gateway_core::{ClientKey, KeyValueStore};
use gateway_telemetry::{Metrics, SecurityEvent, SecurityEventKind, SecurityEventLog};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, warn};

/// What the gatekeeper needs to know about one inbound request
#[derive(Debug, Clone, Copy)]
pub struct Admission<'a> {
    /// Rate-limit key of the caller
    pub client: &'a ClientKey,
    /// Request path
    pub path: &'a str,
    /// Bot-challenge token, from the header or the body
    pub token: Option<&'a str>,
}

/// Rate limiter plus bot verifier
pub struct Gatekeeper {
    rate_limiter: Option<FixedWindowRateLimiter>,
    bot: BotVerificationConfig,
    verifier: Option<Arc<dyn BotVerifier>>,
    events: SecurityEventLog,
    metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("rate_limiter", &self.rate_limiter)
            .field("bot_verification", &self.bot.enabled)
            .field("has_verifier", &self.verifier.is_some())
            .finish_non_exhaustive()
    }
}

impl Gatekeeper {
    /// Create a gatekeeper.
    ///
    /// `verifier` is `None` when no verification secret is configured; the
    /// missing-secret policy then decides what protected requests get.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: &GatekeeperConfig,
        verifier: Option<Arc<dyn BotVerifier>>,
    ) -> Self {
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| FixedWindowRateLimiter::from_config(Arc::clone(&store), &config.rate_limit));

        Self {
            rate_limiter,
            bot: config.bot_verification.clone(),
            verifier,
            events: SecurityEventLog::new(store),
            metrics: None,
        }
    }

    /// Create a gatekeeper with a Turnstile verifier when `secret` is present
    ///
    /// # Errors
    /// Returns error if the verification client cannot be created
    pub fn from_config(
        store: Arc<dyn KeyValueStore>,
        config: &GatekeeperConfig,
        secret: Option<SecretString>,
    ) -> Result<Self> {
        let bot = &config.bot_verification;
        let verifier = match secret {
            Some(secret) if bot.enabled => {
                let verifier = TurnstileVerifier::new(bot.verify_url.clone(), secret, bot.timeout)?;
                Some(Arc::new(verifier) as Arc<dyn BotVerifier>)
            }
            _ => None,
        };
        if bot.enabled && verifier.is_none() {
            warn!(
                policy = ?bot.on_missing_secret,
                env = %bot.secret_env,
                "Bot verification secret not configured"
            );
        }
        Ok(Self::new(store, config, verifier))
    }

    /// Count rejections in `metrics`
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether `path` requires a bot-challenge token
    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        self.bot.enabled && self.bot.protected_paths.iter().any(|p| p == path)
    }

    /// Read the token from the configured header, else the configured body field
    #[must_use]
    pub fn token<'a>(
        &self,
        headers: &'a http::HeaderMap,
        body: &'a serde_json::Value,
    ) -> Option<&'a str> {
        headers
            .get(self.bot.header.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|t| !t.is_empty())
            .or_else(|| body.get(&self.bot.body_field).and_then(serde_json::Value::as_str))
            .filter(|t| !t.is_empty())
    }

    /// Body field that carries the token; stripped before forwarding
    #[must_use]
    pub fn token_field(&self) -> &str {
        &self.bot.body_field
    }

    /// Admit or reject a request
    ///
    /// # Errors
    /// - `RateLimited` when the client's window is exhausted
    /// - `BotVerification` when a protected path lacks a valid token
    pub async fn admit(&self, admission: &Admission<'_>) -> Result<()> {
        if let Some(limiter) = &self.rate_limiter {
            if let RateDecision::Limited { retry_after } = limiter.check(admission.client).await {
                self.reject(
                    SecurityEventKind::RateLimited,
                    admission,
                    format!("limit {} exceeded, retry after {}s", limiter.limit(), retry_after.as_secs()),
                )
                .await;
                return Err(SecurityError::RateLimited {
                    retry_after,
                    limit: limiter.limit(),
                });
            }
        }

        if !self.is_protected(admission.path) {
            return Ok(());
        }

        let Some(verifier) = &self.verifier else {
            return match self.bot.on_missing_secret {
                MissingSecretPolicy::FailOpen => {
                    warn!(path = %admission.path, "Bot verification skipped: no secret configured");
                    Ok(())
                }
                MissingSecretPolicy::FailClosed => {
                    Err(self.bot_failure(admission, vec![MISSING_INPUT_SECRET.to_string()]).await)
                }
            };
        };

        let Some(token) = admission.token else {
            return Err(self
                .bot_failure(admission, vec![MISSING_INPUT_RESPONSE.to_string()])
                .await);
        };

        let remote_ip = Some(admission.client.as_str()).filter(|c| *c != ClientKey::ANONYMOUS);
        let result = verifier.verify(token, remote_ip).await;
        if result.success {
            debug!(client = %admission.client, "Bot verification passed");
            Ok(())
        } else {
            Err(self.bot_failure(admission, result.error_codes).await)
        }
    }

    async fn bot_failure(&self, admission: &Admission<'_>, codes: Vec<String>) -> SecurityError {
        self.reject(SecurityEventKind::BotVerificationFailed, admission, codes.join(","))
            .await;
        SecurityError::BotVerification { codes }
    }

    async fn reject(&self, kind: SecurityEventKind, admission: &Admission<'_>, detail: String) {
        if let Some(metrics) = &self.metrics {
            metrics.record_rejection(&kind.to_string());
        }
        self.events
            .record(SecurityEvent::new(
                kind,
                admission.client.clone(),
                admission.path,
                detail,
            ))
            .await;
    }
}
