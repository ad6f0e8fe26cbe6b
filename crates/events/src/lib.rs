//! Event system for stagegate.
//!
//! This crate provides the broadcast bus and event types used to push
//! run progress (stage changes, approval gates, log lines) to the
//! control surface.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
