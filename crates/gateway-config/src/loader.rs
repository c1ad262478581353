//! Loading, environment overrides, and cross-field validation.

use crate::error::{ConfigError, ConfigResult};
use crate::model::GatewayConfig;
use gateway_core::{EndpointDescriptor, ProviderId, ProviderRegistry};
use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};
use validator::Validate;

/// Load configuration from an optional file, apply environment overrides,
/// and validate.
///
/// Without a path the built-in defaults are used.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, an override is
/// malformed, or validation fails
pub fn load_config(path: Option<&Path>) -> ConfigResult<GatewayConfig> {
    let mut config = match path {
        Some(path) => {
            let config = GatewayConfig::from_file(path)?;
            info!(path = %path.display(), providers = config.providers.len(), "Loaded configuration");
            config
        }
        None => {
            info!("No config file given, using defaults");
            GatewayConfig::default()
        }
    };

    config.apply_env_overrides(|var| std::env::var(var).ok())?;
    config.check()?;
    Ok(config)
}

impl GatewayConfig {
    /// Parse a YAML or TOML file, chosen by extension
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml(&contents),
            "toml" => Self::from_toml(&contents),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Parse YAML text
    ///
    /// # Errors
    /// Returns an error on malformed YAML
    pub fn from_yaml(contents: &str) -> ConfigResult<Self> {
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns an error on malformed TOML
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `GATEWAY_*` overrides using `lookup` to read variables
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("GATEWAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("GATEWAY_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Env {
                var: "GATEWAY_PORT",
                message: format!("'{port}' is not a port number"),
            })?;
        }
        if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
            self.telemetry.log_level = level;
        }
        if let Some(json) = lookup("GATEWAY_LOG_JSON") {
            self.telemetry.json_logs = match json.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Env {
                        var: "GATEWAY_LOG_JSON",
                        message: format!("'{json}' is not a boolean"),
                    })
                }
            };
        }
        Ok(())
    }

    /// Run field validation plus cross-field checks
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn check(&self) -> ConfigResult<()> {
        self.validate()?;

        let mut ids = HashSet::new();
        for provider in &self.providers {
            if !ids.insert(provider.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate provider id '{}'",
                    provider.id
                )));
            }
            check_http_url(&provider.base_url, &format!("providers.{}.base_url", provider.id))?;
        }

        for (model, provider_id) in &self.routing.model_routes {
            let Some(provider) = self.providers.iter().find(|p| &p.id == provider_id) else {
                return Err(ConfigError::Validation(format!(
                    "routing.model_routes.{model} points at unknown provider '{provider_id}'"
                )));
            };
            if !provider.models.iter().any(|m| m == model) {
                return Err(ConfigError::Validation(format!(
                    "routing.model_routes.{model}: provider '{provider_id}' does not serve that model"
                )));
            }
        }

        if self.routing.base_delay > self.routing.max_delay {
            return Err(ConfigError::Validation(
                "routing.base_delay must not exceed routing.max_delay".to_string(),
            ));
        }

        if self.gatekeeper.bot_verification.enabled {
            check_http_url(
                &self.gatekeeper.bot_verification.verify_url,
                "gatekeeper.bot_verification.verify_url",
            )?;
        }

        Ok(())
    }

    /// Build endpoint descriptors, resolving credentials through `lookup`.
    ///
    /// An inline `api_key` wins over `api_key_env`. A provider that needs a
    /// credential but has none is kept (its calls and probes will fail) and
    /// a warning is logged.
    pub fn endpoint_descriptors<F>(&self, lookup: F) -> Vec<EndpointDescriptor>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.providers
            .iter()
            .map(|p| {
                let mut endpoint = EndpointDescriptor::new(p.id.as_str(), p.kind, p.base_url.as_str())
                    .with_models(p.models.iter().cloned())
                    .with_unit_cost(p.unit_cost)
                    .with_avg_latency_ms(p.avg_latency_ms)
                    .with_priority_tier(p.priority_tier);

                let credential = p.api_key.clone().or_else(|| {
                    p.api_key_env
                        .as_deref()
                        .and_then(&lookup)
                        .map(SecretString::new)
                });
                match credential {
                    Some(secret) => endpoint = endpoint.with_credential(secret),
                    None if p.kind.auth_strategy() != gateway_core::AuthStrategy::None => {
                        warn!(provider = %p.id, kind = %p.kind, "Provider has no credential configured");
                    }
                    None => {}
                }
                endpoint
            })
            .collect()
    }

    /// Build the provider registry, reading credentials from the process environment
    #[must_use]
    pub fn provider_registry(&self) -> ProviderRegistry {
        let routes: HashMap<String, ProviderId> = self
            .routing
            .model_routes
            .iter()
            .map(|(model, id)| (model.clone(), ProviderId::new(id.as_str())))
            .collect();
        ProviderRegistry::new(self.endpoint_descriptors(|var| std::env::var(var).ok()))
            .with_model_routes(routes)
    }

    /// Verification secret: inline value, else the configured environment variable
    pub fn verification_secret<F>(&self, lookup: F) -> Option<SecretString>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot = &self.gatekeeper.bot_verification;
        bot.secret
            .clone()
            .or_else(|| lookup(&bot.secret_env).filter(|s| !s.is_empty()).map(SecretString::new))
    }
}

fn check_http_url(value: &str, field: &str) -> ConfigResult<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::Validation(format!("{field}: invalid URL '{value}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::Validation(format!(
            "{field}: unsupported scheme '{scheme}'"
        ))),
    }
}
