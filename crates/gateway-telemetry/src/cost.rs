//! Per-attempt cost estimation.
//!
//! `unit_cost` is USD per 1K tokens. When the provider reports usage the
//! estimate is `total_tokens / 1000 * unit_cost`; otherwise one unit is
//! charged. Self-hosted providers have `unit_cost == 0` and always cost 0.

use gateway_core::{EndpointDescriptor, Usage};

/// Estimated USD cost of a successful attempt, rounded to micro-dollars
#[must_use]
pub fn estimate_cost(endpoint: &EndpointDescriptor, usage: Option<&Usage>) -> f64 {
    let raw = match usage {
        Some(usage) if usage.total_tokens > 0 => {
            f64::from(usage.total_tokens) / 1000.0 * endpoint.unit_cost
        }
        _ => endpoint.unit_cost,
    };
    (raw * 1_000_000.0).round() / 1_000_000.0
}
