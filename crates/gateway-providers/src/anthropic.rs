//! Anthropic Messages API adapter.
//!
//! Differences from the OpenAI shape:
//! - system messages move to a top-level `system` string
//! - `max_tokens` is required
//! - replies carry content blocks and `input_tokens`/`output_tokens`

use crate::wire::{chat_completion, completion_id, pick_parameters, WireRequest};
use gateway_core::{InferenceRequest, MessageRole};
use serde_json::{json, Value};

/// Messages path
pub const MESSAGES_PATH: &str = "/v1/messages";

/// Probe path
pub const PROBE_PATH: &str = "/v1/models";

/// API version header value
pub const API_VERSION: &str = "2023-06-01";

/// `max_tokens` when the caller does not set one
pub const DEFAULT_MAX_TOKENS: u64 = 1024;

pub(crate) fn build_request(request: &InferenceRequest) -> WireRequest {
    let system: Vec<String> = request
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .map(gateway_core::ChatMessage::plain_text)
        .collect();

    let messages: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .map(|m| {
            let role = if m.role == MessageRole::Assistant { "assistant" } else { "user" };
            json!({"role": role, "content": m.plain_text()})
        })
        .collect();

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request
            .parameters
            .get("max_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_TOKENS),
    });
    if let Some(object) = body.as_object_mut() {
        if !system.is_empty() {
            object.insert("system".to_string(), Value::String(system.join("\n\n")));
        }
        object.extend(pick_parameters(request, &["temperature", "top_p", "top_k"]));
        if let Some(stop) = request.parameters.get("stop") {
            let sequences = match stop {
                Value::String(s) => json!([s]),
                other => other.clone(),
            };
            object.insert("stop_sequences".to_string(), sequences);
        }
    }

    WireRequest {
        path: MESSAGES_PATH.to_string(),
        body,
        headers: vec![("anthropic-version", API_VERSION)],
    }
}

pub(crate) fn parse_response(model: &str, body: Value) -> Result<Value, String> {
    let blocks = body
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| "response has no content blocks".to_string())?;

    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();

    let finish_reason = match body.get("stop_reason").and_then(Value::as_str) {
        Some("max_tokens") => "length",
        Some("tool_use") => "tool_calls",
        _ => "stop",
    };

    let usage = body.get("usage").and_then(|u| {
        let input = u.get("input_tokens")?.as_u64()?;
        let output = u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
        Some((input, output))
    });

    let id = body
        .get("id")
        .and_then(Value::as_str)
        .map_or_else(completion_id, str::to_string);
    let model = body.get("model").and_then(Value::as_str).unwrap_or(model);

    Ok(chat_completion(id, model, &text, finish_reason, usage))
}
