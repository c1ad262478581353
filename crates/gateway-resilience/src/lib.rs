//! # Gateway Resilience
//!
//! Resilience patterns for the edge inference gateway:
//! - Linear backoff between failover attempts
//! - Injectable scheduler so backoff is testable without real delays
//! - Failover controller state machine over selector and executor
//! - Background health monitor with per-provider isolation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod failover;
pub mod health_monitor;
pub mod scheduler;

// Re-export main types
pub use backoff::BackoffPolicy;
pub use failover::{FailoverConfig, FailoverController, FailoverOutcome, FailoverState};
pub use health_monitor::{HealthMonitor, HealthMonitorConfig};
pub use scheduler::{RecordingScheduler, Scheduler, TokioScheduler};
