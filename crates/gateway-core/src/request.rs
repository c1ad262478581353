//! Request types for the gateway.
//!
//! Defines the normalized inference request every provider adapter starts
//! from, plus the routing strategy a caller may ask for.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest model identifier accepted
pub const MAX_MODEL_LENGTH: usize = 256;

/// Most messages accepted in one request
pub const MAX_MESSAGES: usize = 512;

/// Provider preference policy for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingStrategy {
    /// Cheapest provider first (free self-hosted before paid cloud)
    #[default]
    CostOptimized,
    /// Fastest provider first
    LatencyOptimized,
    /// Self-hosted providers only, cloud only as an allowed fallback
    LocalFirst,
    /// Alternate between cheap and fast candidates
    Balanced,
    /// Most capable provider first
    QualityOptimized,
}

impl RoutingStrategy {
    /// All strategies, in declaration order
    pub const ALL: [Self; 5] = [
        Self::CostOptimized,
        Self::LatencyOptimized,
        Self::LocalFirst,
        Self::Balanced,
        Self::QualityOptimized,
    ];

    /// Wire name of the strategy
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CostOptimized => "cost-optimized",
            Self::LatencyOptimized => "latency-optimized",
            Self::LocalFirst => "local-first",
            Self::Balanced => "balanced",
            Self::QualityOptimized => "quality-optimized",
        }
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingStrategy {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| {
                GatewayError::validation(format!("unknown routing strategy '{s}'"), Some("strategy"))
            })
    }
}

/// Normalized inference request as received from the browser client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Target model (e.g. "llama3.2", "claude-3-5-haiku")
    pub model: String,

    /// Chat messages for the conversation
    pub messages: Vec<ChatMessage>,

    /// Requested routing strategy; configuration default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<RoutingStrategy>,

    /// Sampling and other OpenAI-compatible parameters, passed through as-is
    #[serde(flatten)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl InferenceRequest {
    /// Create a request for `model` with the given messages
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            strategy: None,
            parameters: serde_json::Map::new(),
        }
    }

    /// Set the routing strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: RoutingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Add a pass-through parameter
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Parse and validate a request from a JSON value.
    ///
    /// Gateway-only fields (the bot-challenge token) are stripped so they never
    /// reach a provider.
    ///
    /// # Errors
    /// Returns a validation error if the body does not match the schema
    pub fn from_json(mut value: serde_json::Value, strip_fields: &[&str]) -> Result<Self, GatewayError> {
        if let Some(object) = value.as_object_mut() {
            for field in strip_fields {
                object.remove(*field);
            }
        } else {
            return Err(GatewayError::validation("request body must be a JSON object", None));
        }

        let request: Self = serde_json::from_value(value)
            .map_err(|e| GatewayError::validation(format!("invalid request body: {e}"), None))?;
        request.validate()?;
        Ok(request)
    }

    /// Validate the entire request
    ///
    /// # Errors
    /// Returns error if any field is invalid
    pub fn validate(&self) -> Result<(), GatewayError> {
        let model = self.model.trim();
        if model.is_empty() {
            return Err(GatewayError::validation("model is required", Some("model")));
        }
        if model.len() > MAX_MODEL_LENGTH {
            return Err(GatewayError::validation(
                format!("model must be at most {MAX_MODEL_LENGTH} characters"),
                Some("model"),
            ));
        }

        if self.messages.is_empty() {
            return Err(GatewayError::validation(
                "messages cannot be empty",
                Some("messages"),
            ));
        }
        if self.messages.len() > MAX_MESSAGES {
            return Err(GatewayError::validation(
                format!("at most {MAX_MESSAGES} messages are accepted"),
                Some("messages"),
            ));
        }

        if let Some(index) = self.messages.iter().position(|m| m.content.is_empty()) {
            return Err(GatewayError::validation(
                format!("messages[{index}].content cannot be empty"),
                Some("messages"),
            ));
        }

        if self.parameters.get("stream").and_then(serde_json::Value::as_bool) == Some(true) {
            return Err(GatewayError::validation(
                "streaming responses are not supported",
                Some("stream"),
            ));
        }

        Ok(())
    }
}

/// Chat message with role and content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author
    pub role: MessageRole,

    /// Content of the message
    pub content: MessageContent,

    /// Optional name of the author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(MessageRole::Assistant, content)
    }

    fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
            name: None,
        }
    }

    /// Flatten content to plain text (text parts joined by newlines)
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.content.plain_text()
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
    /// Tool response message
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// Message content (text or multimodal parts)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Multimodal content parts, forwarded untouched
    Parts(Vec<serde_json::Value>),
}

impl MessageContent {
    /// Check if content is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }

    /// Text view of the content
    #[must_use]
    pub fn plain_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| part.get("text").and_then(serde_json::Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
