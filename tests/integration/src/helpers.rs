//! Test helper utilities for integration tests

use chrono::Utc;
use gateway_config::GatewayConfig;
use gateway_core::{
    HealthRecord, HealthStore, InferenceLogEntry, KeyValueStore, MemoryStore, ProviderId,
};
use gateway_server::{AppState, Server};
use gateway_telemetry::load_entries;
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::fixtures::CLIENT_IP;
use crate::mock_providers::VALID_TOKEN;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// A gateway running on an ephemeral port
pub struct TestGateway {
    /// Base URL of the gateway
    pub base_url: String,
    /// HTTP client for making requests
    pub client: Client,
    /// Shared application state
    pub state: AppState,
    /// Store behind health, rate limits and logs
    pub store: Arc<dyn KeyValueStore>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl TestGateway {
    /// Start a gateway with `config`; providers in `healthy` get a fresh
    /// healthy record first
    pub async fn start(config: GatewayConfig, healthy: &[&str]) -> Self {
        init_tracing();

        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let health = HealthStore::new(Arc::clone(&store));
        for id in healthy {
            mark(&health, id, true).await;
        }

        let state = AppState::builder()
            .config(config)
            .store(Arc::clone(&store))
            .build()
            .expect("Failed to build state");

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Server::new(state.clone()).serve(listener, shutdown.clone()));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            state,
            store,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Get the full URL for a path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    /// POST a chat body with a valid token from the default client address
    pub async fn chat(&self, body: &Value) -> Response {
        self.post_json_with_headers(
            "/v1/chat/completions",
            body,
            vec![("cf-turnstile-response", VALID_TOKEN), ("cf-connecting-ip", CLIENT_IP)],
        )
        .await
    }

    /// Make a POST request with JSON body and headers
    pub async fn post_json_with_headers(
        &self,
        path: &str,
        body: &Value,
        headers: Vec<(&str, &str)>,
    ) -> Response {
        let mut builder = self.client.post(self.url(path)).json(body);
        for (key, value) in headers {
            builder = builder.header(key, value);
        }
        builder.send().await.expect("Request failed")
    }

    /// Mark a provider healthy or unhealthy
    pub async fn set_health(&self, provider: &str, healthy: bool) {
        mark(&self.state.health, provider, healthy).await;
    }

    /// Flush and read the inference log
    pub async fn inference_log(&self) -> Vec<InferenceLogEntry> {
        self.state.telemetry.flush().await;
        load_entries(self.store.as_ref())
            .await
            .expect("Failed to read inference log")
    }

    /// Stop the server and wait for it to exit
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await.expect("Server task panicked").expect("Server error");
        }
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn mark(health: &HealthStore, provider: &str, healthy: bool) {
    let id = ProviderId::new(provider);
    health
        .upsert(&id, |_| {
            if healthy {
                HealthRecord::healthy(id.clone(), Duration::from_millis(20), Utc::now())
            } else {
                HealthRecord::unhealthy(id.clone(), 3, Utc::now())
            }
        })
        .await
        .expect("Failed to write health record");
}

/// Parse response body as JSON
pub async fn json_body(response: Response) -> Value {
    response.json().await.expect("Failed to parse JSON")
}

/// Read a response header as a string
pub fn header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}
