//! # Gateway Server
//!
//! HTTP surface of the edge inference gateway.
//!
//! This crate provides:
//! - Axum router with OpenAI-compatible chat and model endpoints
//! - Gatekeeping (rate limit, bot verification) ahead of routing
//! - Health, liveness and Prometheus endpoints
//! - Graceful shutdown driven by a root cancellation token

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

// Re-export main types
pub use error::{ApiError, ErrorBody};
pub use routes::create_router;
pub use server::Server;
pub use shutdown::{shutdown_signal, spawn_signal_listener};
pub use state::{AppState, AppStateBuilder};
