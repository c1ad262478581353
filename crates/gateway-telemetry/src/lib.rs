//! # Gateway Telemetry
//!
//! Observability for the edge inference gateway.
//!
//! This crate provides:
//! - Structured logging setup (`tracing-subscriber`, JSON or pretty)
//! - Prometheus metrics
//! - The asynchronous, non-blocking inference log
//! - Cost estimation per attempt
//! - The security event log

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod cost;
pub mod inference_log;
pub mod logging;
pub mod metrics;

// Re-export main types
pub use audit::{SecurityEvent, SecurityEventKind, SecurityEventLog, SECURITY_EVENTS_KEY};
pub use cost::estimate_cost;
pub use inference_log::{load_entries, TelemetryLogger};
pub use logging::{init_logging, LoggingConfig, LoggingError};
pub use metrics::Metrics;
