//! # Vigil Domain
//!
//! Domain types shared by the Vigil agent crates.
//!
//! This crate contains:
//! - Agent configuration structures and their validation
//! - Metric events and the collector wire envelope
//! - Domain error types and Result definitions
//! - Endpoint, default and environment variable constants
//!
//! ## Architecture
//! - No dependencies on other Vigil crates
//! - Only external dependencies allowed
//! - Pure data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod event;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use event::{Envelope, MetricEvent};
