//! # Edge Inference Gateway
//!
//! OpenAI-compatible gateway that admits requests (rate limit, bot
//! verification), routes them across self-hosted and cloud providers by
//! strategy and health, fails over on provider errors, and logs every attempt.
//!
//! ## Usage
//!
//! ```bash
//! # Start with built-in defaults
//! edge-inference-gateway
//!
//! # Start with a config file
//! edge-inference-gateway --config /path/to/gateway.yaml
//!
//! # Validate a config file and exit
//! edge-inference-gateway --config gateway.yaml --check
//!
//! # Environment overrides
//! GATEWAY_PORT=9000 edge-inference-gateway
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gateway_config::{load_config, GatewayConfig};
use gateway_core::{ForwardingExecutor, HealthProbe};
use gateway_providers::{ExecutorConfig, HttpExecutor};
use gateway_resilience::{HealthMonitor, HealthMonitorConfig};
use gateway_server::{spawn_signal_listener, AppState, Server};
use gateway_telemetry::{init_logging, LoggingConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "edge-inference-gateway", version, about)]
struct Args {
    /// Configuration file (YAML or TOML)
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

/// Application entry point
#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    if args.check {
        println!(
            "Configuration OK: {} providers, default strategy {}",
            config.providers.len(),
            config.routing.default_strategy
        );
        return;
    }

    let logging = LoggingConfig::new(config.telemetry.log_level.clone())
        .with_json(config.telemetry.json_logs);
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting edge inference gateway"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "Gateway failed");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        host = %config.server.host,
        port = config.server.port,
        providers = config.providers.len(),
        strategy = %config.routing.default_strategy,
        "Configuration loaded"
    );

    let http = Arc::new(
        HttpExecutor::new(
            ExecutorConfig::default().with_request_timeout(config.routing.request_timeout),
        )
        .context("failed to create provider HTTP client")?,
    );

    let health_config = HealthMonitorConfig {
        interval: config.health.interval,
        probe_timeout: config.health.probe_timeout,
        unhealthy_threshold: config.health.unhealthy_threshold,
    };
    let health_enabled = config.health.enabled;

    let state = AppState::builder()
        .config(config)
        .executor(Arc::clone(&http) as Arc<dyn ForwardingExecutor>)
        .build()
        .context("failed to build application state")?;

    if state.registry.is_empty() {
        warn!("No providers configured; every chat request will be rejected");
    }

    let shutdown = CancellationToken::new();
    let signals = spawn_signal_listener(shutdown.clone());

    let monitor = if health_enabled {
        let monitor = HealthMonitor::new(
            Arc::clone(&state.registry),
            http as Arc<dyn HealthProbe>,
            state.health.clone(),
            health_config,
        )
        .with_metrics(Arc::clone(&state.metrics));
        Some(monitor.spawn(shutdown.clone()))
    } else {
        warn!("Health monitor disabled; providers stay unroutable until a record exists");
        None
    };

    let telemetry = state.telemetry.clone();
    let result = Server::new(state).run(shutdown.clone()).await;

    // Stop background tasks even when the server exited on its own
    shutdown.cancel();
    if let Some(monitor) = monitor {
        if let Err(e) = monitor.await {
            warn!(error = %e, "Health monitor task ended abnormally");
        }
    }
    signals.abort();

    telemetry.flush().await;
    info!(
        telemetry_failures = telemetry.failures(),
        "Inference log flushed"
    );

    result.context("server error")?;
    info!("Gateway stopped");
    Ok(())
}
