//! Health monitor probing real HTTP endpoints

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_core::{ForwardingExecutor, HealthProbe, ProviderId, ProviderKind};
use gateway_providers::{ExecutorConfig, HttpExecutor};
use gateway_resilience::{HealthMonitor, HealthMonitorConfig};
use std::sync::Arc;
use std::time::Duration;

fn monitor(gateway: &TestGateway, probe_timeout: Duration) -> HealthMonitor {
    let probe = Arc::new(HttpExecutor::new(ExecutorConfig::default()).unwrap());
    HealthMonitor::new(
        Arc::clone(&gateway.state.registry),
        probe as Arc<dyn HealthProbe>,
        gateway.state.health.clone(),
        HealthMonitorConfig {
            interval: Duration::from_secs(60),
            probe_timeout,
            unhealthy_threshold: 1,
        },
    )
    .with_metrics(Arc::clone(&gateway.state.metrics))
}

#[tokio::test]
async fn test_probe_results_drive_routing() {
    let up = MockProvider::start().await;
    up.mock_probe(200).await;
    up.mock_chat_completion(MODEL, "from up").await;
    let down = MockProvider::start().await;
    down.mock_probe(503).await;
    down.mock_chat_completion(MODEL, "from down").await;
    let turnstile = MockTurnstile::start().await;

    // The cheaper provider fails its probe
    let config = test_config(
        vec![
            provider("down", ProviderKind::Ollama, &down.url(), &[MODEL], 0.0),
            provider("up", ProviderKind::OpenaiCompatible, &up.url(), &[MODEL], 0.0006),
        ],
        &turnstile.verify_url(),
    );
    let gateway = TestGateway::start(config, &[]).await;

    let records = monitor(&gateway, Duration::from_secs(2)).run_once().await;
    assert_eq!(records.len(), 2);

    let snapshot = gateway.state.health.snapshot().await.unwrap();
    let freshness = Duration::from_secs(300);
    assert!(snapshot.is_routable(&ProviderId::new("up"), freshness));
    assert!(!snapshot.is_routable(&ProviderId::new("down"), freshness));

    let response = gateway
        .chat(&chat_body_with_strategy(MODEL, "cost-optimized"))
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "x-provider-used").as_deref(), Some("up"));
    assert_eq!(down.chat_calls().await, 0);

    let health = gateway.get("/health").await;
    assert_eq!(health.status(), 200);
    let body = json_body(health).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["providers"]["up"]["healthy"], true);
    assert_eq!(body["providers"]["down"]["healthy"], false);

    gateway.stop().await;
}

#[tokio::test]
async fn test_hung_probe_times_out_as_unhealthy() {
    let hung = MockProvider::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&hung.server)
        .await;
    let turnstile = MockTurnstile::start().await;

    let config = test_config(
        vec![provider("hung", ProviderKind::Ollama, &hung.url(), &[MODEL], 0.0)],
        &turnstile.verify_url(),
    );
    let gateway = TestGateway::start(config, &["hung"]).await;

    let started = std::time::Instant::now();
    let records = monitor(&gateway, Duration::from_millis(200)).run_once().await;
    assert!(started.elapsed() < Duration::from_secs(3));

    assert_eq!(records.len(), 1);
    assert!(!records[0].healthy);
    assert_eq!(records[0].consecutive_failures, 1);

    let health = gateway.get("/health").await;
    assert_eq!(health.status(), 503);
    assert_eq!(json_body(health).await["status"], "unhealthy");

    gateway.stop().await;
}

#[tokio::test]
async fn test_executor_and_probe_share_one_client() {
    let up = MockProvider::start().await;
    up.mock_probe(200).await;
    up.mock_chat_completion(MODEL, "pong").await;

    let executor = Arc::new(HttpExecutor::new(ExecutorConfig::default()).unwrap());
    let endpoint = gateway_core::EndpointDescriptor::new("up", ProviderKind::Ollama, up.url())
        .with_model(MODEL);

    let latency = executor
        .probe(&endpoint, Duration::from_secs(1))
        .await
        .unwrap();
    assert!(latency < Duration::from_secs(1));

    let request = gateway_core::InferenceRequest::from_json(chat_body(MODEL), &[]).unwrap();
    let response = executor
        .execute(&endpoint, &request, &tokio_util::sync::CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.body["choices"][0]["message"]["content"], "pong");
}
