//! # Vigil Infrastructure
//!
//! Infrastructure implementations of core ports, plus the agent facade.
//!
//! This crate contains:
//! - The HTTPS collector transport (`reqwest`)
//! - Configuration loading from files and `VIGIL_*` variables
//! - The background runtime that carries deliveries
//! - Logging setup
//!
//! ## Architecture
//! - Implements traits defined in `vigil-core`
//! - Depends on `vigil-domain` and `vigil-core`
//! - Contains all "impure" code (network, files, environment)

pub mod agent;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod runtime;
pub mod transport;

// Re-export commonly used items
pub use agent::Agent;
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use observability::{init_logging, LoggingConfig};
pub use runtime::BackgroundRuntime;
pub use transport::HttpTransport;
