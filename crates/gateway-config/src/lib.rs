//! # Gateway Config
//!
//! Typed configuration for the edge inference gateway.
//!
//! - YAML or TOML file, chosen by extension
//! - `GATEWAY_*` environment overrides
//! - Field validation via `validator` plus cross-field checks
//! - Credential resolution from environment variables into `secrecy` values

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use loader::load_config;
pub use model::{
    BotVerificationConfig, GatekeeperConfig, GatewayConfig, HealthConfig, MissingSecretPolicy,
    ProviderConfig, RateLimitConfig, RoutingConfig, ServerConfig, TelemetryConfig,
};
