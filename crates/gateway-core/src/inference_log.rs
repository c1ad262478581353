//! Inference log entries and the attempt recorder seam.

use crate::request::RoutingStrategy;
use crate::types::{ProviderId, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store key of the append-only inference log
pub const INFERENCE_LOG_KEY: &str = "inference_log";

/// Outcome of a single provider attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    /// Provider returned a usable response
    Success,
    /// Provider call failed
    Failed,
}

/// One row of the inference log; written per attempt, not per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceLogEntry {
    pub request_id: RequestId,
    pub provider_id: ProviderId,
    pub model: String,
    /// Estimated cost; zero for failures
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub status: AttemptStatus,
    /// Internal diagnostic, may contain upstream text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub strategy: RoutingStrategy,
    /// Always false: the gateway has no response cache
    pub was_cached: bool,
    /// 1-based attempt number within the failover loop
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

/// Sink for per-attempt log entries.
///
/// `record` must return immediately and never fail the caller; write errors
/// are the recorder's own concern.
pub trait AttemptRecorder: Send + Sync {
    /// Queue an entry for writing
    fn record(&self, entry: InferenceLogEntry);
}
