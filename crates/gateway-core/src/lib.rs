//! # Gateway Core
//!
//! Core types, traits, and error handling for the edge inference gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Normalized inference requests and the per-request context
//! - Endpoint descriptors and the immutable provider registry
//! - Health records and health snapshots
//! - The injected key-value store abstraction
//! - Inference log entries and the attempt recorder seam
//! - Error types and handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod health;
pub mod inference_log;
pub mod provider;
pub mod registry;
pub mod request;
pub mod response;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use context::RequestContext;
pub use error::{AttemptFailure, GatewayError, GatewayResult, ProviderError, ProviderErrorKind};
pub use health::{HealthRecord, HealthSnapshot, HealthStore};
pub use inference_log::{AttemptRecorder, AttemptStatus, InferenceLogEntry};
pub use provider::{
    AuthStrategy, EndpointDescriptor, ForwardingExecutor, HealthProbe, ProviderKind,
};
pub use registry::ProviderRegistry;
pub use request::{ChatMessage, InferenceRequest, MessageRole, RoutingStrategy};
pub use response::{ProviderResponse, Usage};
pub use store::{
    KeyValueStore, MemoryStore, StoreError, StoreResult, WindowCount, DEFAULT_LIST_CAPACITY,
};
pub use types::{ClientKey, ProviderId, RequestId};
