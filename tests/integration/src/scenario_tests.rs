//! End-to-end routing, admission and failover scenarios

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_core::{AttemptStatus, ProviderKind};
use gateway_telemetry::{SecurityEventKind, SecurityEventLog};
use std::time::Duration;

#[tokio::test]
async fn test_cost_optimized_prefers_free_local_provider() {
    let local = MockProvider::start().await;
    let cloud = MockProvider::start().await;
    local.mock_chat_completion(MODEL, "from local").await;
    cloud.mock_chat_completion(MODEL, "from cloud").await;
    let turnstile = MockTurnstile::start().await;

    let config = test_config(
        vec![
            provider("cloud", ProviderKind::OpenaiCompatible, &cloud.url(), &[MODEL], 0.0006),
            provider("local", ProviderKind::Ollama, &local.url(), &[MODEL], 0.0),
        ],
        &turnstile.verify_url(),
    );
    let gateway = TestGateway::start(config, &["local", "cloud"]).await;

    let response = gateway
        .chat(&chat_body_with_strategy(MODEL, "cost-optimized"))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "x-provider-used").as_deref(), Some("local"));
    assert_eq!(header(&response, "x-attempt").as_deref(), Some("1"));
    assert_eq!(header(&response, "x-cost-usd").as_deref(), Some("0.000000"));
    let body = json_body(response).await;
    assert_eq!(body["choices"][0]["message"]["content"], "from local");

    assert_eq!(local.chat_calls().await, 1);
    assert_eq!(cloud.chat_calls().await, 0);

    // Gateway-only fields never reach the provider
    let forwarded = &local.chat_requests().await[0];
    assert!(forwarded.get("strategy").is_none());
    assert_eq!(forwarded["temperature"], 0.2);

    gateway.stop().await;
}

#[tokio::test]
async fn test_local_first_without_fallback_is_503() {
    let local = MockProvider::start().await;
    let cloud = MockProvider::start().await;
    local.mock_chat_completion(MODEL, "from local").await;
    cloud.mock_chat_completion(MODEL, "from cloud").await;
    let turnstile = MockTurnstile::start().await;

    let mut config = test_config(
        vec![
            provider("local", ProviderKind::Ollama, &local.url(), &[MODEL], 0.0),
            provider("cloud", ProviderKind::OpenaiCompatible, &cloud.url(), &[MODEL], 0.0006),
        ],
        &turnstile.verify_url(),
    );
    config.routing.allow_cloud_fallback = false;
    let gateway = TestGateway::start(config, &["cloud"]).await;
    gateway.set_health("local", false).await;

    let response = gateway
        .chat(&chat_body_with_strategy(MODEL, "local-first"))
        .await;

    assert_eq!(response.status(), 503);
    assert!(header(&response, "x-request-id").is_some());
    let body = json_body(response).await;
    assert_eq!(body["error"], "service unavailable");

    assert_eq!(local.chat_calls().await, 0);
    assert_eq!(cloud.chat_calls().await, 0);

    gateway.stop().await;
}

#[tokio::test]
async fn test_local_first_with_fallback_uses_cloud() {
    let cloud = MockProvider::start().await;
    cloud.mock_chat_completion(MODEL, "from cloud").await;
    let turnstile = MockTurnstile::start().await;

    let mut config = test_config(
        vec![
            provider("local", ProviderKind::Ollama, "http://127.0.0.1:9", &[MODEL], 0.0),
            provider("cloud", ProviderKind::OpenaiCompatible, &cloud.url(), &[MODEL], 0.0006),
        ],
        &turnstile.verify_url(),
    );
    config.routing.allow_cloud_fallback = true;
    let gateway = TestGateway::start(config, &["cloud"]).await;
    gateway.set_health("local", false).await;

    let response = gateway
        .chat(&chat_body_with_strategy(MODEL, "local-first"))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "x-provider-used").as_deref(), Some("cloud"));

    gateway.stop().await;
}

#[tokio::test]
async fn test_request_over_limit_gets_retry_after() {
    let local = MockProvider::start().await;
    local.mock_chat_completion(MODEL, "ok").await;
    let turnstile = MockTurnstile::start().await;

    let mut config = test_config(
        vec![provider("local", ProviderKind::Ollama, &local.url(), &[MODEL], 0.0)],
        &turnstile.verify_url(),
    );
    config.gatekeeper.rate_limit.limit = 100;
    config.gatekeeper.rate_limit.window = Duration::from_secs(60);
    let gateway = std::sync::Arc::new(TestGateway::start(config, &["local"]).await);

    let mut admitted = tokio::task::JoinSet::new();
    for _ in 0..100 {
        let gateway = std::sync::Arc::clone(&gateway);
        admitted.spawn(async move { gateway.chat(&chat_body(MODEL)).await.status() });
    }
    while let Some(status) = admitted.join_next().await {
        assert_eq!(status.unwrap(), 200);
    }

    let response = gateway.chat(&chat_body(MODEL)).await;
    assert_eq!(response.status(), 429);
    assert_eq!(header(&response, "retry-after").as_deref(), Some("60"));
    let body = json_body(response).await;
    assert_eq!(body["error"], "rate limit exceeded");
    assert_eq!(body["details"]["limit"], 100);

    // A different client still has its own window
    let other = gateway
        .post_json_with_headers(
            "/v1/chat/completions",
            &chat_body(MODEL),
            vec![("cf-turnstile-response", VALID_TOKEN), ("cf-connecting-ip", "198.51.100.9")],
        )
        .await;
    assert_eq!(other.status(), 200);

    let events = SecurityEventLog::new(gateway.store.clone()).events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SecurityEventKind::RateLimited);
    assert_eq!(events[0].client_key.as_str(), CLIENT_IP);
}

#[tokio::test]
async fn test_forwarded_headers_ignored_from_untrusted_peer() {
    let local = MockProvider::start().await;
    local.mock_chat_completion(MODEL, "ok").await;
    let turnstile = MockTurnstile::start().await;

    let mut config = test_config(
        vec![provider("local", ProviderKind::Ollama, &local.url(), &[MODEL], 0.0)],
        &turnstile.verify_url(),
    );
    config.server.trusted_proxies = Vec::new();
    config.gatekeeper.rate_limit.limit = 2;
    let gateway = TestGateway::start(config, &["local"]).await;

    // Rotating the forwarded address does not open a new window
    let mut statuses = Vec::new();
    for spoofed in ["198.51.100.1", "198.51.100.2", "198.51.100.3"] {
        let response = gateway
            .post_json_with_headers(
                "/v1/chat/completions",
                &chat_body(MODEL),
                vec![
                    ("cf-turnstile-response", VALID_TOKEN),
                    ("x-forwarded-for", spoofed),
                    ("cf-connecting-ip", spoofed),
                ],
            )
            .await;
        statuses.push(response.status().as_u16());
    }
    assert_eq!(statuses, vec![200, 200, 429]);

    let events = SecurityEventLog::new(gateway.store.clone()).events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].client_key.as_str(), "127.0.0.1");

    gateway.stop().await;
}

#[tokio::test]
async fn test_two_timeouts_then_third_provider_succeeds() {
    let slow_a = MockProvider::start().await;
    let slow_b = MockProvider::start().await;
    let fast = MockProvider::start().await;
    slow_a
        .mock_chat_completion_delayed(MODEL, "too late", Duration::from_secs(3))
        .await;
    slow_b
        .mock_chat_completion_delayed(MODEL, "too late", Duration::from_secs(3))
        .await;
    fast.mock_chat_completion(MODEL, "made it").await;
    let turnstile = MockTurnstile::start().await;

    let config = test_config(
        vec![
            provider("cloud-a", ProviderKind::OpenaiCompatible, &slow_a.url(), &[MODEL], 0.001),
            provider("cloud-b", ProviderKind::OpenaiCompatible, &slow_b.url(), &[MODEL], 0.002),
            provider("cloud-c", ProviderKind::OpenaiCompatible, &fast.url(), &[MODEL], 0.003),
        ],
        &turnstile.verify_url(),
    );
    let gateway = TestGateway::start(config, &["cloud-a", "cloud-b", "cloud-c"]).await;

    let response = gateway
        .chat(&chat_body_with_strategy(MODEL, "cost-optimized"))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "x-attempt").as_deref(), Some("3"));
    assert_eq!(header(&response, "x-provider-used").as_deref(), Some("cloud-c"));
    let request_id = header(&response, "x-request-id").unwrap();

    let entries = gateway.inference_log().await;
    assert_eq!(entries.len(), 3);
    let providers: Vec<&str> = entries.iter().map(|e| e.provider_id.as_str()).collect();
    assert_eq!(providers, vec!["cloud-a", "cloud-b", "cloud-c"]);
    let statuses: Vec<AttemptStatus> = entries.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![AttemptStatus::Failed, AttemptStatus::Failed, AttemptStatus::Success]
    );
    let attempts: Vec<u32> = entries.iter().map(|e| e.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(entries.iter().all(|e| e.request_id.to_string() == request_id));
    assert!(entries[0].cost_usd.abs() < f64::EPSILON);
    assert!(entries[2].cost_usd > 0.0);

    gateway.stop().await;
}

#[tokio::test]
async fn test_missing_token_rejected_before_routing() {
    let local = MockProvider::start().await;
    local.mock_chat_completion(MODEL, "ok").await;
    let turnstile = MockTurnstile::start().await;

    let config = test_config(
        vec![provider("local", ProviderKind::Ollama, &local.url(), &[MODEL], 0.0)],
        &turnstile.verify_url(),
    );
    let gateway = TestGateway::start(config, &["local"]).await;

    let response = gateway
        .post_json_with_headers(
            "/v1/chat/completions",
            &chat_body(MODEL),
            vec![("cf-connecting-ip", CLIENT_IP)],
        )
        .await;

    assert_eq!(response.status(), 403);
    let body = json_body(response).await;
    assert_eq!(body["error"], "bot verification failed");
    assert_eq!(body["details"]["codes"][0], "missing-input-response");

    assert_eq!(local.chat_calls().await, 0);
    assert_eq!(turnstile.calls().await, 0);
    assert!(gateway.inference_log().await.is_empty());

    let events = SecurityEventLog::new(gateway.store.clone()).events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SecurityEventKind::BotVerificationFailed);

    gateway.stop().await;
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let local = MockProvider::start().await;
    local.mock_chat_completion(MODEL, "ok").await;
    let turnstile = MockTurnstile::start().await;

    let config = test_config(
        vec![provider("local", ProviderKind::Ollama, &local.url(), &[MODEL], 0.0)],
        &turnstile.verify_url(),
    );
    let gateway = TestGateway::start(config, &["local"]).await;

    let response = gateway
        .post_json_with_headers(
            "/api/chat",
            &chat_body(MODEL),
            vec![("cf-turnstile-response", "forged")],
        )
        .await;

    assert_eq!(response.status(), 403);
    let body = json_body(response).await;
    assert_eq!(body["details"]["codes"][0], "invalid-input-response");
    assert_eq!(turnstile.calls().await, 1);
    assert_eq!(local.chat_calls().await, 0);

    gateway.stop().await;
}

#[tokio::test]
async fn test_body_token_accepted_and_stripped() {
    let local = MockProvider::start().await;
    local.mock_chat_completion(MODEL, "ok").await;
    let turnstile = MockTurnstile::start().await;

    let config = test_config(
        vec![provider("local", ProviderKind::Ollama, &local.url(), &[MODEL], 0.0)],
        &turnstile.verify_url(),
    );
    let gateway = TestGateway::start(config, &["local"]).await;

    let mut body = chat_body(MODEL);
    body["turnstileToken"] = serde_json::Value::from(VALID_TOKEN);
    let response = gateway.post_json_with_headers("/api/chat", &body, vec![]).await;

    assert_eq!(response.status(), 200);
    let forwarded = &local.chat_requests().await[0];
    assert!(forwarded.get("turnstileToken").is_none());

    gateway.stop().await;
}

#[tokio::test]
async fn test_all_providers_failing_is_503_without_upstream_body() {
    let a = MockProvider::start().await;
    let b = MockProvider::start().await;
    a.mock_chat_error(500).await;
    b.mock_chat_error(502).await;
    let turnstile = MockTurnstile::start().await;

    let config = test_config(
        vec![
            provider("cloud-a", ProviderKind::OpenaiCompatible, &a.url(), &[MODEL], 0.001),
            provider("cloud-b", ProviderKind::OpenaiCompatible, &b.url(), &[MODEL], 0.002),
        ],
        &turnstile.verify_url(),
    );
    let gateway = TestGateway::start(config, &["cloud-a", "cloud-b"]).await;

    let response = gateway
        .chat(&chat_body_with_strategy(MODEL, "cost-optimized"))
        .await;

    assert_eq!(response.status(), 503);
    let body = json_body(response).await;
    assert!(!body.to_string().contains("do-not-leak"));
    let reasons: Vec<&str> = body["details"]["attempts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["reason"].as_str().unwrap())
        .collect();
    assert_eq!(reasons, vec!["upstream_status_500", "upstream_status_502"]);

    let entries = gateway.inference_log().await;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.status == AttemptStatus::Failed));

    gateway.stop().await;
}
