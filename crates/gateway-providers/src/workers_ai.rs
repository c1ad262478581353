//! Cloudflare Workers AI adapter.
//!
//! `base_url` is the account API root, e.g.
//! `https://api.cloudflare.com/client/v4/accounts/{account_id}`.

use crate::wire::{chat_completion, completion_id, pick_parameters, WireRequest};
use gateway_core::InferenceRequest;
use serde_json::{json, Value};

/// Probe path (cheapest authenticated call)
pub const PROBE_PATH: &str = "/ai/models/search?per_page=1";

/// Run path for a model
#[must_use]
pub fn run_path(model: &str) -> String {
    format!("/ai/run/{model}")
}

pub(crate) fn build_request(request: &InferenceRequest) -> WireRequest {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({"role": m.role.to_string(), "content": m.plain_text()}))
        .collect();

    let mut body = json!({ "messages": messages });
    if let Some(object) = body.as_object_mut() {
        object.extend(pick_parameters(
            request,
            &["max_tokens", "temperature", "top_p", "top_k", "seed"],
        ));
    }

    WireRequest {
        path: run_path(&request.model),
        body,
        headers: Vec::new(),
    }
}

pub(crate) fn parse_response(model: &str, body: Value) -> Result<Value, String> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let errors = body.get("errors").map(Value::to_string).unwrap_or_default();
        return Err(format!("workers ai reported failure: {errors}"));
    }

    let result = body
        .get("result")
        .ok_or_else(|| "response has no result".to_string())?;
    let text = result
        .get("response")
        .and_then(Value::as_str)
        .ok_or_else(|| "result has no response text".to_string())?;

    let usage = result.get("usage").and_then(|u| {
        let prompt = u.get("prompt_tokens")?.as_u64()?;
        let completion = u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0);
        Some((prompt, completion))
    });

    Ok(chat_completion(completion_id(), model, text, "stop", usage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::ChatMessage;

    #[test]
    fn test_build_request() {
        let request = InferenceRequest::new(
            "@cf/meta/llama-3.1-8b-instruct",
            vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
        )
        .with_parameter("max_tokens", json!(128))
        .with_parameter("presence_penalty", json!(1.0));

        let wire = build_request(&request);
        assert_eq!(wire.path, "/ai/run/@cf/meta/llama-3.1-8b-instruct");
        assert_eq!(wire.body["messages"][0]["role"], "system");
        assert_eq!(wire.body["max_tokens"], json!(128));
        assert!(wire.body.get("presence_penalty").is_none());
        assert!(wire.body.get("model").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "result": {"response": "Hello!", "usage": {"prompt_tokens": 4, "completion_tokens": 2, "total_tokens": 6}},
            "success": true,
            "errors": []
        });
        let completion = parse_response("@cf/meta/llama-3.1-8b-instruct", body).unwrap();
        assert_eq!(completion["choices"][0]["message"]["content"], "Hello!");
        assert_eq!(completion["model"], "@cf/meta/llama-3.1-8b-instruct");
        assert_eq!(completion["usage"]["total_tokens"], 6);
        assert!(completion["id"].as_str().unwrap().starts_with("chatcmpl-"));
    }

    #[test]
    fn test_reported_failure() {
        let body = json!({"success": false, "errors": [{"code": 5007, "message": "No such model"}]});
        assert!(parse_response("m", body).is_err());
    }
}
