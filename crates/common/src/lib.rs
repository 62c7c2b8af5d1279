//! Modular common utilities shared across Vigil crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: `thiserror` error types, no side effects
//! - `observability`: tracing instrumentation
//! - `runtime`: async infrastructure (resilience)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use resilience::{
    Bulkhead, BulkheadConfig, BulkheadPermit, CallPermission, CircuitBreaker,
    CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerSnapshot, CircuitState,
    Clock, MockClock, SystemClock,
};
