//! Reporting pipeline: gate, dispatch and outcome accounting

pub mod client;
pub mod dispatch;
pub mod ports;
pub mod stats;

pub use client::{ReportingClient, ReportingClientBuilder};
pub use dispatch::{DeliverySlot, Dispatcher, SharedBreaker};
pub use ports::{DeliveryOutcome, MetricTransport, TransportError};
pub use stats::{ReportingStats, ReportingStatsSnapshot};
