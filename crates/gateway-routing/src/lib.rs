//! # Gateway Routing
//!
//! Deterministic provider selection for the edge inference gateway.
//!
//! This crate provides:
//! - Preference orderings for each routing strategy
//! - A selector that applies static model routes, health, and exclusions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod selector;
pub mod strategy;

pub use selector::{RoutingSelector, SelectorConfig};
pub use strategy::preference_order;
