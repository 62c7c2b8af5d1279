//! Port interfaces for metric delivery
//!
//! The core decides what to send; implementations in the infra crate decide
//! how bytes reach the collector.

use async_trait::async_trait;
use thiserror::Error;
use vigil_domain::Envelope;

/// Why a single delivery attempt did not produce an HTTP status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connect or read deadline elapsed
    #[error("delivery timed out: {0}")]
    Timeout(String),

    /// Could not establish a connection
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other failure while sending or receiving
    #[error("request failed: {0}")]
    Request(String),

    /// Envelope could not be encoded
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Sends one envelope to the collector
///
/// Exactly one attempt per call, no retries. Returns the response status;
/// classification of the status is left to the caller.
#[async_trait]
pub trait MetricTransport: Send + Sync {
    async fn send(&self, envelope: &Envelope) -> Result<u16, TransportError>;
}

/// Result of one delivery, as recorded against the circuit breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Collector answered 2xx
    Delivered { status: u16 },
    /// Collector answered with any other status
    Rejected { status: u16 },
    /// Transport reported an error
    Failed(TransportError),
    /// The overall delivery deadline elapsed
    TimedOut,
    /// The transport panicked
    Panicked,
}

impl DeliveryOutcome {
    pub fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            Self::Delivered { status }
        } else {
            Self::Rejected { status }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}
