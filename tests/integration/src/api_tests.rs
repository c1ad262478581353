//! HTTP surface tests

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_core::ProviderKind;

async fn single_provider_gateway() -> (TestGateway, MockProvider, MockTurnstile) {
    let local = MockProvider::start().await;
    local.mock_chat_completion(MODEL, "ok").await;
    let turnstile = MockTurnstile::start().await;

    let config = test_config(
        vec![
            provider("local", ProviderKind::Ollama, &local.url(), &[MODEL], 0.0),
            provider(
                "cloud",
                ProviderKind::OpenaiCompatible,
                "http://127.0.0.1:9",
                &[MODEL, "gpt-4o-mini"],
                0.0006,
            ),
        ],
        &turnstile.verify_url(),
    );
    let gateway = TestGateway::start(config, &["local"]).await;
    (gateway, local, turnstile)
}

#[tokio::test]
async fn test_models_listing() {
    let (gateway, _local, _turnstile) = single_provider_gateway().await;

    let response = gateway.get("/v1/models").await;
    assert_eq!(response.status(), 200);
    let body = json_body(response).await;
    assert_eq!(body["object"], "list");
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![MODEL, "gpt-4o-mini"]);

    gateway.stop().await;
}

#[tokio::test]
async fn test_health_and_liveness() {
    let (gateway, _local, _turnstile) = single_provider_gateway().await;

    let live = gateway.get("/live").await;
    assert_eq!(live.status(), 200);
    assert_eq!(json_body(live).await["status"], "alive");

    let health = gateway.get("/health").await;
    assert_eq!(health.status(), 200);
    let body = json_body(health).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["providers"]["local"]["healthy"], true);
    assert_eq!(body["providers"]["local"]["latency_ms"], 20);
    assert_eq!(body["providers"]["cloud"]["healthy"], false);

    gateway.stop().await;
}

#[tokio::test]
async fn test_metrics_reflect_traffic() {
    let (gateway, _local, _turnstile) = single_provider_gateway().await;

    assert_eq!(gateway.chat(&chat_body(MODEL)).await.status(), 200);
    let rejected = gateway
        .post_json_with_headers("/v1/chat/completions", &chat_body(MODEL), vec![])
        .await;
    assert_eq!(rejected.status(), 403);

    let response = gateway.get("/metrics").await;
    assert_eq!(response.status(), 200);
    let text = response.text().await.unwrap();
    assert!(text.contains("gateway_requests_total"));
    assert!(text.contains("outcome=\"success\""));
    assert!(text.contains("reason=\"bot_verification_failed\""));

    gateway.stop().await;
}

#[tokio::test]
async fn test_invalid_json_is_400_with_request_id() {
    let (gateway, local, _turnstile) = single_provider_gateway().await;

    let response = gateway
        .client
        .post(gateway.url("/v1/chat/completions"))
        .header("content-type", "application/json")
        .header("cf-turnstile-response", VALID_TOKEN)
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert!(header(&response, "x-request-id").is_some());
    assert_eq!(json_body(response).await["error"], "invalid request");
    assert_eq!(local.chat_calls().await, 0);

    gateway.stop().await;
}

#[tokio::test]
async fn test_streaming_rejected() {
    let (gateway, local, _turnstile) = single_provider_gateway().await;

    let mut body = chat_body(MODEL);
    body["stream"] = serde_json::Value::Bool(true);
    let response = gateway.chat(&body).await;

    assert_eq!(response.status(), 400);
    assert_eq!(local.chat_calls().await, 0);

    gateway.stop().await;
}

#[tokio::test]
async fn test_unknown_model_is_503() {
    let (gateway, local, _turnstile) = single_provider_gateway().await;

    let response = gateway.chat(&chat_body("mistral-large")).await;
    assert_eq!(response.status(), 503);
    let body = json_body(response).await;
    assert!(body["details"]["message"]
        .as_str()
        .unwrap()
        .contains("mistral-large"));
    assert_eq!(local.chat_calls().await, 0);

    gateway.stop().await;
}

#[tokio::test]
async fn test_supplied_request_id_is_echoed() {
    let (gateway, _local, _turnstile) = single_provider_gateway().await;
    let request_id = "0b8f6c1e-3d2a-4f5b-9c7e-1a2b3c4d5e6f";

    let response = gateway
        .post_json_with_headers(
            "/v1/chat/completions",
            &chat_body(MODEL),
            vec![("cf-turnstile-response", VALID_TOKEN), ("x-request-id", request_id)],
        )
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "x-request-id").as_deref(), Some(request_id));

    let entries = gateway.inference_log().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].request_id.to_string(), request_id);

    gateway.stop().await;
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let local = MockProvider::start().await;
    let turnstile = MockTurnstile::start().await;
    let mut config = test_config(
        vec![provider("local", ProviderKind::Ollama, &local.url(), &[MODEL], 0.0)],
        &turnstile.verify_url(),
    );
    config.server.body_limit_bytes = 1024;
    let gateway = TestGateway::start(config, &["local"]).await;

    let mut body = chat_body(MODEL);
    body["messages"][0]["content"] = serde_json::Value::from("x".repeat(4096));
    let response = gateway.chat(&body).await;

    assert_eq!(response.status(), 413);
    assert_eq!(local.chat_calls().await, 0);

    gateway.stop().await;
}
