//! Mock upstreams for integration testing
//!
//! Wiremock servers that speak the OpenAI chat-completions API (which Ollama
//! also serves) and the Turnstile siteverify API.

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock OpenAI-compatible provider
pub struct MockProvider {
    pub server: MockServer,
}

impl MockProvider {
    /// Start a new mock provider
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Answer chat completions with `content`
    pub async fn mock_chat_completion(&self, model: &str, content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(model, content)))
            .mount(&self.server)
            .await;
    }

    /// Answer chat completions only after `delay`
    pub async fn mock_chat_completion_delayed(&self, model: &str, content: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_response(model, content))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Fail chat completions with `status`
    pub async fn mock_chat_error(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": {"type": "server_error", "message": "internal stack trace: do-not-leak"}
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer the Ollama and OpenAI probe paths with `status`
    pub async fn mock_probe(&self, status: u16) {
        for probe in ["/api/tags", "/v1/models"] {
            Mock::given(method("GET"))
                .and(path(probe))
                .respond_with(ResponseTemplate::new(status).set_body_json(json!({"models": []})))
                .mount(&self.server)
                .await;
        }
    }

    /// Chat requests received so far
    pub async fn chat_requests(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == "/v1/chat/completions")
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }

    /// Number of chat requests received so far
    pub async fn chat_calls(&self) -> usize {
        self.chat_requests().await.len()
    }
}

/// Mock Turnstile siteverify endpoint
pub struct MockTurnstile {
    pub server: MockServer,
}

/// Token the mock accepts
pub const VALID_TOKEN: &str = "valid-token";

impl MockTurnstile {
    /// Start a verifier that accepts [`VALID_TOKEN`] and rejects everything else
    pub async fn start() -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/siteverify"))
            .and(body_string_contains(format!("response={VALID_TOKEN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "error-codes": []
            })))
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/siteverify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error-codes": ["invalid-input-response"]
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        Self { server }
    }

    /// Siteverify URL
    pub fn verify_url(&self) -> String {
        format!("{}/siteverify", self.server.uri())
    }

    /// Number of verification calls received
    pub async fn calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}

/// OpenAI chat completion body
pub fn chat_response(model: &str, content: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
    })
}
