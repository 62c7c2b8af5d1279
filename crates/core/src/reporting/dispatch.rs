//! Fire-and-forget delivery of envelopes on a background runtime
//!
//! Every delivery runs as its own task holding a bulkhead permit. The task
//! applies an overall deadline, catches panics from the transport and feeds
//! the outcome back to the circuit breaker. Nothing escapes the task.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::{debug, instrument, trace};
use vigil_common::resilience::{Bulkhead, BulkheadConfig, BulkheadPermit, CircuitBreaker, Clock};
use vigil_domain::{Envelope, Result, VigilError};

use super::ports::{DeliveryOutcome, MetricTransport};
use super::stats::ReportingStats;

/// Breaker type shared between the caller-side gate and delivery tasks
pub type SharedBreaker = Arc<CircuitBreaker<Arc<dyn Clock>>>;

/// A reserved in-flight slot; must be obtained before consulting the breaker
/// so a probe is never granted to an event that then cannot be sent.
#[derive(Debug)]
pub struct DeliverySlot {
    permit: BulkheadPermit,
}

/// Schedules deliveries onto a runtime without waiting for them
pub struct Dispatcher {
    handle: Handle,
    transport: Arc<dyn MetricTransport>,
    breaker: Option<SharedBreaker>,
    stats: Arc<ReportingStats>,
    bulkhead: Bulkhead,
    deadline: Duration,
}

impl Dispatcher {
    pub fn new(
        handle: Handle,
        transport: Arc<dyn MetricTransport>,
        breaker: Option<SharedBreaker>,
        stats: Arc<ReportingStats>,
        max_in_flight: usize,
        deadline: Duration,
    ) -> Result<Self> {
        let bulkhead = Bulkhead::new(BulkheadConfig::new(max_in_flight))
            .map_err(|err| VigilError::Config(err.to_string()))?;

        Ok(Self { handle, transport, breaker, stats, bulkhead, deadline })
    }

    /// Reserve an in-flight slot, or `None` when the cap is reached.
    pub fn reserve(&self) -> Option<DeliverySlot> {
        self.bulkhead.try_acquire().map(|permit| DeliverySlot { permit })
    }

    /// Spawn the delivery and return immediately.
    pub fn deliver(&self, envelope: Envelope, slot: DeliverySlot) {
        trace!(event = %envelope.event, "Scheduling delivery");

        let task = deliver_one(
            Arc::clone(&self.transport),
            self.breaker.clone(),
            Arc::clone(&self.stats),
            envelope,
            self.deadline,
            slot,
        );
        // A runtime that is shutting down drops the task; that is an
        // acceptable loss for at-most-once delivery.
        drop(self.handle.spawn(task));
    }

    /// Deliveries currently running
    pub fn in_flight(&self) -> usize {
        self.bulkhead.current_concurrent()
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("in_flight", &self.in_flight())
            .field("deadline", &self.deadline)
            .field("breaker", &self.breaker.is_some())
            .finish()
    }
}

#[instrument(level = "debug", skip_all, fields(event = %envelope.event))]
async fn deliver_one(
    transport: Arc<dyn MetricTransport>,
    breaker: Option<SharedBreaker>,
    stats: Arc<ReportingStats>,
    envelope: Envelope,
    deadline: Duration,
    slot: DeliverySlot,
) {
    let attempt = AssertUnwindSafe(tokio::time::timeout(deadline, transport.send(&envelope)))
        .catch_unwind()
        .await;

    let outcome = match attempt {
        Ok(Ok(Ok(status))) => DeliveryOutcome::from_status(status),
        Ok(Ok(Err(err))) => DeliveryOutcome::Failed(err),
        Ok(Err(_elapsed)) => DeliveryOutcome::TimedOut,
        Err(_panic) => DeliveryOutcome::Panicked,
    };

    if outcome.is_success() {
        stats.record_delivered();
        if let Some(breaker) = &breaker {
            breaker.record_success();
        }
    } else {
        debug!(outcome = ?outcome, "Delivery failed");
        stats.record_failed();
        if let Some(breaker) = &breaker {
            breaker.record_failure();
        }
    }

    drop(slot.permit);
}
