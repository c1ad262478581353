//! OpenAI-compatible chat completions (also used for Ollama).
//!
//! The normalized request already is an OpenAI request, so the body is
//! forwarded as-is minus gateway-only fields.

use crate::wire::WireRequest;
use gateway_core::InferenceRequest;
use serde_json::{json, Value};

/// Chat completions path
pub const CHAT_PATH: &str = "/v1/chat/completions";

/// Probe path for OpenAI-compatible APIs
pub const PROBE_PATH: &str = "/v1/models";

/// Probe path for Ollama (cheap local model listing)
pub const OLLAMA_PROBE_PATH: &str = "/api/tags";

pub(crate) fn build_request(request: &InferenceRequest) -> WireRequest {
    let mut body = json!({
        "model": request.model,
        "messages": request.messages,
    });
    if let Some(object) = body.as_object_mut() {
        for (key, value) in &request.parameters {
            object.entry(key.clone()).or_insert_with(|| value.clone());
        }
        object.insert("stream".to_string(), Value::Bool(false));
    }

    WireRequest {
        path: CHAT_PATH.to_string(),
        body,
        headers: Vec::new(),
    }
}

pub(crate) fn parse_response(body: Value) -> Result<Value, String> {
    match body.get("choices") {
        Some(Value::Array(choices)) if !choices.is_empty() => Ok(body),
        Some(Value::Array(_)) => Err("completion has no choices".to_string()),
        _ => Err("response is not a chat completion".to_string()),
    }
}
