//! Shared pieces of the provider wire adapters.

use gateway_core::{InferenceRequest, ProviderKind};
use serde_json::{json, Map, Value};

/// Provider-specific request ready to send
#[derive(Debug, Clone)]
pub(crate) struct WireRequest {
    /// Path relative to the endpoint base URL
    pub path: String,
    /// JSON body
    pub body: Value,
    /// Extra static headers
    pub headers: Vec<(&'static str, &'static str)>,
}

/// Build the wire request for `kind`
pub(crate) fn build_request(kind: ProviderKind, request: &InferenceRequest) -> WireRequest {
    match kind {
        ProviderKind::Ollama | ProviderKind::OpenaiCompatible => crate::openai::build_request(request),
        ProviderKind::Anthropic => crate::anthropic::build_request(request),
        ProviderKind::WorkersAi => crate::workers_ai::build_request(request),
    }
}

/// Translate a 2xx body into an OpenAI chat completion
pub(crate) fn normalize_response(kind: ProviderKind, model: &str, body: Value) -> Result<Value, String> {
    match kind {
        ProviderKind::Ollama | ProviderKind::OpenaiCompatible => crate::openai::parse_response(body),
        ProviderKind::Anthropic => crate::anthropic::parse_response(model, body),
        ProviderKind::WorkersAi => crate::workers_ai::parse_response(model, body),
    }
}

/// Liveness probe path for `kind`
pub(crate) fn probe_path(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Ollama => crate::openai::OLLAMA_PROBE_PATH,
        ProviderKind::OpenaiCompatible => crate::openai::PROBE_PATH,
        ProviderKind::Anthropic => crate::anthropic::PROBE_PATH,
        ProviderKind::WorkersAi => crate::workers_ai::PROBE_PATH,
    }
}

/// Copy the listed pass-through parameters that are present
pub(crate) fn pick_parameters(request: &InferenceRequest, names: &[&str]) -> Map<String, Value> {
    names
        .iter()
        .filter_map(|name| {
            request
                .parameters
                .get(*name)
                .map(|value| ((*name).to_string(), value.clone()))
        })
        .collect()
}

/// Assemble an OpenAI chat completion with a single assistant choice
pub(crate) fn chat_completion(
    id: String,
    model: &str,
    content: &str,
    finish_reason: &str,
    usage: Option<(u64, u64)>,
) -> Value {
    let mut completion = json!({
        "id": id,
        "object": "chat.completion",
        "created": chrono::Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": finish_reason,
        }],
    });
    if let Some((prompt, completion_tokens)) = usage {
        completion["usage"] = json!({
            "prompt_tokens": prompt,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt + completion_tokens,
        });
    }
    completion
}

/// Fresh completion id for providers that do not return one
pub(crate) fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}
