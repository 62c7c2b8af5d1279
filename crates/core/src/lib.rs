//! # Vigil Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Sampling policy and include/exclude name filters
//! - The reporting client and its fire-and-forget dispatcher
//! - Port interfaces (traits) for metric delivery
//! - Request-scoped context and interceptor registration
//!
//! ## Architecture Principles
//! - Only depends on `vigil-common` and `vigil-domain`
//! - No HTTP or platform code
//! - All external dependencies via traits

pub mod context;
pub mod instrumentation;
pub mod reporting;
pub mod revision;
pub mod sampling;

// Re-export specific items to avoid ambiguity
pub use context::RequestContext;
pub use instrumentation::{Instrumentation, InstrumentationBuilder, Interceptor, UnitOutcome};
pub use reporting::{
    DeliveryOutcome, MetricTransport, ReportingClient, ReportingClientBuilder, ReportingStats,
    ReportingStatsSnapshot, TransportError,
};
pub use sampling::{ScopeFilters, ScopeKind};
