//! Response types for the gateway.

use serde::{Deserialize, Serialize};

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

impl Usage {
    /// Create a new usage record
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Read the `usage` object of an OpenAI-shaped completion, if present
    #[must_use]
    pub fn from_completion(body: &serde_json::Value) -> Option<Self> {
        let usage = body.get("usage")?;
        let field = |name: &str| {
            usage
                .get(name)
                .and_then(serde_json::Value::as_u64)
                .map(|v| v as u32)
        };
        let prompt = field("prompt_tokens")?;
        let completion = field("completion_tokens").unwrap_or(0);
        Some(Self::new(prompt, completion))
    }
}

/// Successful provider answer, already normalized to the OpenAI
/// chat-completion shape
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Chat-completion JSON returned to the client
    pub body: serde_json::Value,
    /// Token usage reported by the provider, if any
    pub usage: Option<Usage>,
}

impl ProviderResponse {
    /// Wrap a normalized completion body, picking up its usage
    #[must_use]
    pub fn new(body: serde_json::Value) -> Self {
        let usage = Usage::from_completion(&body);
        Self { body, usage }
    }
}
