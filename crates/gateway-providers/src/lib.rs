//! # Gateway Providers
//!
//! Forwarding executor for the edge inference gateway.
//!
//! Each provider kind has a small wire adapter that turns the normalized
//! request into the provider's request shape and its reply back into an
//! OpenAI chat completion:
//! - Ollama and any OpenAI-compatible API
//! - Anthropic Messages API
//! - Cloudflare Workers AI
//!
//! [`HttpExecutor`] owns the HTTP client, attaches credentials, enforces the
//! call timeout, and abandons calls when the request is cancelled.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod executor;
pub mod openai;
pub mod workers_ai;

mod wire;

pub use executor::{ExecutorConfig, HttpExecutor};
