//! # Gateway Security
//!
//! Request gatekeeping for the edge inference gateway.
//!
//! ## Features
//!
//! - **Rate Limiting**: per-client fixed windows over the shared store
//! - **Client Identity**: forwarding headers honored only from trusted proxies
//! - **Bot Verification**: Turnstile-style challenge tokens on protected paths
//! - **Security Events**: every rejection is logged and persisted
//!
//! ## Example
//!
//! ```rust,no_run
//! use gateway_config::GatekeeperConfig;
//! use gateway_core::MemoryStore;
//! use gateway_security::Gatekeeper;
//! use std::sync::Arc;
//!
//! let gatekeeper = Gatekeeper::new(Arc::new(MemoryStore::new()), &GatekeeperConfig::default(), None);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bot_verification;
pub mod client_ip;
pub mod error;
pub mod gatekeeper;
pub mod rate_limit;

pub use bot_verification::{BotVerifier, TurnstileVerifier, VerificationResult};
pub use client_ip::TrustedProxies;
pub use error::{Result, SecurityError};
pub use gatekeeper::{Admission, Gatekeeper};
pub use rate_limit::{FixedWindowRateLimiter, RateDecision};
