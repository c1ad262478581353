//! Security event log.
//!
//! Gatekeeper rejections are appended to the store and emitted as `warn`
//! lines with target `security`, so they can be routed separately from
//! application logs.

use chrono::{DateTime, Utc};
use gateway_core::{ClientKey, KeyValueStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

/// Store key of the append-only security event list
pub const SECURITY_EVENTS_KEY: &str = "security_events";

/// Security event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    /// Bot-challenge token missing or rejected
    BotVerificationFailed,
    /// Client exceeded its request window
    RateLimited,
}

impl std::fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BotVerificationFailed => write!(f, "bot_verification_failed"),
            Self::RateLimited => write!(f, "rate_limited"),
        }
    }
}

/// One rejected request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    pub client_key: ClientKey,
    pub path: String,
    /// Error codes or limit details
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    /// Create an event stamped now
    #[must_use]
    pub fn new(
        kind: SecurityEventKind,
        client_key: ClientKey,
        path: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            client_key,
            path: path.into(),
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Writer for security events
#[derive(Clone)]
pub struct SecurityEventLog {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SecurityEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityEventLog")
            .field("backend", &self.store.name())
            .finish()
    }
}

impl SecurityEventLog {
    /// Create a log over `store`
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Log and persist an event. Persistence failures are logged, never returned.
    pub async fn record(&self, event: SecurityEvent) {
        warn!(
            target: "security",
            kind = %event.kind,
            client = %event.client_key,
            path = %event.path,
            detail = %event.detail,
            "Request rejected"
        );

        let result = match serde_json::to_vec(&event) {
            Ok(bytes) => self.store.append(SECURITY_EVENTS_KEY, bytes).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            error!(target: "security", error = %e, "Failed to persist security event");
        }
    }

    /// All persisted events, oldest first
    ///
    /// # Errors
    /// Returns error if the store read or decoding fails
    pub async fn events(&self) -> StoreResult<Vec<SecurityEvent>> {
        self.store
            .list(SECURITY_EVENTS_KEY)
            .await?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(Into::into))
            .collect()
    }
}
