//! Error types used throughout the agent

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Vigil
///
/// Only configuration errors ever reach the host application. Every other
/// variant is produced and consumed inside the reporting path.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum VigilError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VigilError {
    /// Whether this error came from configuration validation.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for Vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;
