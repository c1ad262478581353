//! Fixed-window rate limiting.
//!
//! One counter per client key, created by the first request of a window and
//! expiring with it. The count is a single atomic `increment` on the store,
//! so concurrent requests from one client never undercount.

use gateway_config::RateLimitConfig;
use gateway_core::{ClientKey, KeyValueStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Store key prefix for rate limit buckets
pub const RATE_LIMIT_KEY_PREFIX: &str = "ratelimit:";

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request admitted
    Allowed {
        /// Requests left in the current window
        remaining: u64,
    },
    /// Window exhausted
    Limited {
        /// Whole seconds until the window closes, at least one
        retry_after: Duration,
    },
}

/// Per-client fixed-window limiter over the shared store
#[derive(Clone)]
pub struct FixedWindowRateLimiter {
    store: Arc<dyn KeyValueStore>,
    limit: u64,
    window: Duration,
}

impl std::fmt::Debug for FixedWindowRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindowRateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl FixedWindowRateLimiter {
    /// Create a limiter allowing `limit` requests per `window`
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    /// Create a limiter from configuration
    #[must_use]
    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &RateLimitConfig) -> Self {
        Self::new(store, config.limit, config.window)
    }

    /// Requests allowed per window
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Count one request for `client`.
    ///
    /// A store failure admits the request: undercounting is preferred over
    /// rejecting traffic because the store is down.
    pub async fn check(&self, client: &ClientKey) -> RateDecision {
        let key = format!("{RATE_LIMIT_KEY_PREFIX}{client}");
        match self.store.increment(&key, self.window).await {
            Ok(window) if window.count > self.limit => {
                debug!(client = %client, count = window.count, limit = self.limit, "Rate limit exceeded");
                RateDecision::Limited {
                    retry_after: retry_after(window.expires_in),
                }
            }
            Ok(window) => RateDecision::Allowed {
                remaining: self.limit - window.count,
            },
            Err(e) => {
                warn!(client = %client, error = %e, "Rate limit store unavailable, admitting request");
                RateDecision::Allowed {
                    remaining: self.limit,
                }
            }
        }
    }
}

/// Round the time left in a window up to whole seconds, minimum one
fn retry_after(expires_in: Duration) -> Duration {
    let secs = expires_in.as_secs() + u64::from(expires_in.subsec_nanos() > 0);
    Duration::from_secs(secs.max(1))
}
