//! Observability for the agent itself
//!
//! The agent reports host telemetry; its own diagnostics go through `tracing`.

pub mod logging;

pub use logging::{init_logging, LoggingConfig};
