//! Per-request context.

use crate::request::RoutingStrategy;
use crate::types::{ClientKey, RequestId};
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// State carried through one inbound request.
///
/// Created by the HTTP handler; `attempt_number` is advanced by the failover
/// controller. Dropping the handler future cancels `cancel`.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request identifier echoed in `X-Request-ID`
    pub request_id: RequestId,
    /// Rate-limit key of the caller
    pub client_id: ClientKey,
    /// Model named in the request body
    pub model_requested: String,
    /// Effective routing strategy
    pub strategy: RoutingStrategy,
    /// Current attempt, 1-based; 0 before the first attempt
    pub attempt_number: u32,
    /// Wall-clock start, for log entries
    pub started_at: DateTime<Utc>,
    /// Monotonic start, for latency
    pub started: Instant,
    /// Fires when the client disconnects or the gateway shuts down
    pub cancel: CancellationToken,
}

impl RequestContext {
    /// Create a context for a new request
    #[must_use]
    pub fn new(
        request_id: RequestId,
        client_id: ClientKey,
        model_requested: impl Into<String>,
        strategy: RoutingStrategy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            request_id,
            client_id,
            model_requested: model_requested.into(),
            strategy,
            attempt_number: 0,
            started_at: Utc::now(),
            started: Instant::now(),
            cancel,
        }
    }

    /// Advance to the next attempt and return its number
    pub fn next_attempt(&mut self) -> u32 {
        self.attempt_number += 1;
        self.attempt_number
    }

    /// Whether the request has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempts_increment() {
        let mut ctx = RequestContext::new(
            RequestId::generate(),
            ClientKey::anonymous(),
            "llama3.2",
            RoutingStrategy::default(),
            CancellationToken::new(),
        );
        assert_eq!(ctx.attempt_number, 0);
        assert_eq!(ctx.next_attempt(), 1);
        assert_eq!(ctx.next_attempt(), 2);

        assert!(!ctx.is_cancelled());
        ctx.cancel.cancel();
        assert!(ctx.is_cancelled());
    }
}
