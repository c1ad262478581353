//! Integration tests for the edge inference gateway
//!
//! The gateway runs on a real listener with wiremock standing in for the
//! providers and the bot-verification endpoint. Covered:
//! - Routing by strategy and health
//! - Rate limiting and bot verification
//! - Failover with inference logging
//! - Health monitoring and the HTTP surface

pub mod fixtures;
pub mod helpers;
pub mod mock_providers;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;
pub use mock_providers::*;

#[cfg(test)]
mod api_tests;
#[cfg(test)]
mod health_tests;
#[cfg(test)]
mod scenario_tests;
