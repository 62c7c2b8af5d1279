//! Shared fixtures for reporting pipeline tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use vigil_common::resilience::{Clock, MockClock};
use vigil_core::{MetricTransport, ReportingClient, TransportError};
use vigil_domain::{AgentConfig, AgentConfigBuilder, Envelope};

/// In-memory transport that records every envelope it is asked to send
pub struct RecordingTransport {
    status: AtomicU16,
    fail_with: Mutex<Option<TransportError>>,
    gate: Option<Arc<Semaphore>>,
    attempts: AtomicUsize,
    sent: Mutex<Vec<Envelope>>,
}

impl RecordingTransport {
    pub fn new(status: u16) -> Arc<Self> {
        Arc::new(Self::build(status, None))
    }

    /// Every send waits until the returned semaphore hands out a permit.
    pub fn gated(status: u16) -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Arc::new(Self::build(status, Some(Arc::clone(&gate)))), gate)
    }

    fn build(status: u16, gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            status: AtomicU16::new(status),
            fail_with: Mutex::new(None),
            gate,
            attempts: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn fail_with(&self, error: Option<TransportError>) {
        *self.fail_with.lock() = error;
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MetricTransport for RecordingTransport {
    async fn send(&self, envelope: &Envelope) -> Result<u16, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push(envelope.clone());

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if let Some(error) = self.fail_with.lock().clone() {
            return Err(error);
        }
        Ok(self.status.load(Ordering::SeqCst))
    }
}

/// Config builder with a key and enough in-flight room for bulk tests
pub fn config() -> AgentConfigBuilder {
    AgentConfig::builder().api_key("test-key").max_in_flight(256)
}

pub fn client(
    config: AgentConfig,
    transport: Arc<RecordingTransport>,
    clock: &MockClock,
) -> Arc<ReportingClient> {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let client = ReportingClient::builder(config)
        .transport(transport)
        .clock(clock)
        .revision("rev-test")
        .env_sample_rate(None)
        .build()
        .expect("client builds");
    Arc::new(client)
}

/// Wait until every background delivery has completed.
pub async fn wait_idle(client: &ReportingClient) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while client.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("deliveries settle");
}

/// Wait until the transport has seen `count` attempts.
pub async fn wait_attempts(transport: &RecordingTransport, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while transport.attempts() < count {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("attempts observed");
}
