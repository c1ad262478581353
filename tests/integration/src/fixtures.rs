//! Test fixtures and sample data for integration tests

use gateway_config::{GatewayConfig, ProviderConfig};
use gateway_core::ProviderKind;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::time::Duration;

/// Default test model
pub const MODEL: &str = "llama3.2";

/// Client address sent as `cf-connecting-ip`
pub const CLIENT_IP: &str = "203.0.113.50";

/// Minimal chat body
pub fn chat_body(model: &str) -> Value {
    json!({
        "model": model,
        "messages": [{"role": "user", "content": "Hello, how are you?"}]
    })
}

/// Chat body with an explicit routing strategy
pub fn chat_body_with_strategy(model: &str, strategy: &str) -> Value {
    json!({
        "model": model,
        "strategy": strategy,
        "messages": [
            {"role": "system", "content": "You are terse."},
            {"role": "user", "content": "Hello"}
        ],
        "temperature": 0.2
    })
}

/// Provider entry serving `models`
pub fn provider(id: &str, kind: ProviderKind, base_url: &str, models: &[&str], unit_cost: f64) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        kind,
        base_url: base_url.to_string(),
        models: models.iter().map(ToString::to_string).collect(),
        unit_cost,
        avg_latency_ms: 500,
        priority_tier: 3,
        api_key_env: None,
        api_key: (kind != ProviderKind::Ollama).then(|| SecretString::new("sk-test".to_string())),
    }
}

/// Configuration with fast backoff and timeouts, verification against `verify_url`
pub fn test_config(providers: Vec<ProviderConfig>, verify_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.providers = providers;
    config.routing.base_delay = Duration::from_millis(10);
    config.routing.max_delay = Duration::from_millis(50);
    config.routing.request_timeout = Duration::from_millis(300);
    config.server.shutdown_grace = Duration::from_secs(2);
    config.gatekeeper.bot_verification.verify_url = verify_url.to_string();
    config.gatekeeper.bot_verification.secret = Some(SecretString::new("turnstile-secret".to_string()));
    config
}
