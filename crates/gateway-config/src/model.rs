//! Configuration file schema.
//!
//! Every section has serde defaults, so an empty file (or no file) yields a
//! runnable gateway with no providers. Durations use humantime strings such
//! as `"60s"` or `"500ms"`.

use gateway_core::{ProviderKind, RoutingStrategy};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener
    #[validate(nested)]
    pub server: ServerConfig,

    /// Provider endpoints, in routing tie-break order
    #[validate(nested)]
    pub providers: Vec<ProviderConfig>,

    /// Routing and failover
    #[validate(nested)]
    pub routing: RoutingConfig,

    /// Background health probing
    #[validate(nested)]
    pub health: HealthConfig,

    /// Rate limiting and bot verification
    #[validate(nested)]
    pub gatekeeper: GatekeeperConfig,

    /// Logging and telemetry
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    #[validate(length(min = 1))]
    pub host: String,

    /// Bind port
    #[validate(range(min = 1))]
    pub port: u16,

    /// Largest accepted request body
    #[validate(range(min = 1024))]
    pub body_limit_bytes: usize,

    /// Allowed CORS origins; empty allows any origin
    pub cors_allowed_origins: Vec<String>,

    /// How long in-flight requests may run after a shutdown signal
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,

    /// Peers (addresses or CIDR) whose forwarding headers identify the client
    pub trusted_proxies: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            body_limit_bytes: 1024 * 1024,
            cors_allowed_origins: Vec::new(),
            shutdown_grace: Duration::from_secs(10),
            trusted_proxies: vec!["127.0.0.1".to_string(), "::1".to_string()],
        }
    }
}

/// One provider endpoint
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProviderConfig {
    /// Unique provider id
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    /// Wire protocol
    pub kind: ProviderKind,

    /// Base URL, e.g. `http://ollama:11434`
    #[validate(length(min = 1))]
    pub base_url: String,

    /// Models served by this endpoint
    #[validate(length(min = 1))]
    pub models: Vec<String>,

    /// USD per 1K tokens
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub unit_cost: f64,

    /// Typical latency, for latency-ordered routing
    #[serde(default = "default_avg_latency_ms")]
    pub avg_latency_ms: u64,

    /// Capability tier, 1 = most capable
    #[serde(default = "default_priority_tier")]
    #[validate(range(min = 1, max = 10))]
    pub priority_tier: u8,

    /// Environment variable holding the credential
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Inline credential; prefer `api_key_env`
    #[serde(default)]
    pub api_key: Option<SecretString>,
}

fn default_avg_latency_ms() -> u64 {
    1_000
}

fn default_priority_tier() -> u8 {
    3
}

/// Routing selector and failover controller settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct RoutingConfig {
    /// Strategy used when a request names none
    pub default_strategy: RoutingStrategy,

    /// Static model → provider id routes checked before the strategy order
    pub model_routes: HashMap<String, String>,

    /// Let `local-first` fall back to cloud providers
    pub allow_cloud_fallback: bool,

    /// Health records older than this are treated as unhealthy
    #[serde(with = "humantime_serde")]
    pub health_freshness: Duration,

    /// Attempts per request, including the first
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    /// Backoff unit; attempt `n` waits `n * base_delay`
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Backoff ceiling
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Timeout of a single provider call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_strategy: RoutingStrategy::CostOptimized,
            model_routes: HashMap::new(),
            allow_cloud_fallback: false,
            health_freshness: Duration::from_secs(300),
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Health monitor settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct HealthConfig {
    /// Run the background monitor
    pub enabled: bool,

    /// Time between probe rounds
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Timeout of one probe
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Consecutive failures before a provider is marked unhealthy
    #[validate(range(min = 1, max = 100))]
    pub unhealthy_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
            unhealthy_threshold: 1,
        }
    }
}

/// Gatekeeper settings
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Fixed-window rate limiting
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,

    /// Bot-challenge verification
    #[validate(nested)]
    pub bot_verification: BotVerificationConfig,
}

/// Per-client fixed-window limit
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enforce the limit
    pub enabled: bool,

    /// Requests allowed per window
    #[validate(range(min = 1))]
    pub limit: u64,

    /// Window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// What to do when the verification secret is not configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingSecretPolicy {
    /// Admit the request and log a warning
    FailOpen,
    /// Reject with `missing-input-secret`
    #[default]
    FailClosed,
}

/// Turnstile-style token verification
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct BotVerificationConfig {
    /// Verify tokens on protected paths
    pub enabled: bool,

    /// Paths that require a token
    pub protected_paths: Vec<String>,

    /// Header carrying the token
    #[validate(length(min = 1))]
    pub header: String,

    /// JSON body field carrying the token when the header is absent
    #[validate(length(min = 1))]
    pub body_field: String,

    /// Verification endpoint
    #[validate(length(min = 1))]
    pub verify_url: String,

    /// Environment variable holding the verification secret
    pub secret_env: String,

    /// Inline secret; prefer `secret_env`
    pub secret: Option<SecretString>,

    /// Behavior when no secret is available
    pub on_missing_secret: MissingSecretPolicy,

    /// Timeout of the verification call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for BotVerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            protected_paths: vec!["/v1/chat/completions".to_string(), "/api/chat".to_string()],
            header: "cf-turnstile-response".to_string(),
            body_field: "turnstileToken".to_string(),
            verify_url: "https://challenges.cloudflare.com/turnstile/v0/siteverify".to_string(),
            secret_env: "TURNSTILE_SECRET_KEY".to_string(),
            secret: None,
            on_missing_secret: MissingSecretPolicy::FailClosed,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Logging and inference-log settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Default log filter when `RUST_LOG` is unset
    #[validate(length(min = 1))]
    pub log_level: String,

    /// Emit JSON log lines
    pub json_logs: bool,

    /// Capacity of the inference-log channel
    #[validate(range(min = 1))]
    pub channel_capacity: usize,

    /// Entries kept per in-memory log list before the oldest are dropped
    #[validate(range(min = 1))]
    pub max_log_entries: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            channel_capacity: 1024,
            max_log_entries: 10_000,
        }
    }
}
