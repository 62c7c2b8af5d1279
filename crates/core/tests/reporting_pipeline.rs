//! End-to-end tests for the reporting pipeline
//!
//! Drives `ReportingClient::post_metric` against an in-memory transport and
//! checks what reached the transport and what the circuit breaker saw.

mod support;

use std::time::Duration;

use serde_json::json;
use support::{client, config, wait_attempts, wait_idle, RecordingTransport};
use vigil_common::resilience::{CircuitState, MockClock};
use vigil_core::{ReportingStatsSnapshot, TransportError};
use vigil_domain::AgentConfig;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zero_sample_rate_delivers_nothing() {
    let transport = RecordingTransport::new(200);
    let client =
        client(config().sample_rate(0).build().unwrap(), transport.clone(), &MockClock::new());

    for _ in 0..100 {
        client.post_metric("request", json!({"duration_ms": 5}));
    }
    wait_idle(&client).await;

    assert_eq!(transport.attempts(), 0);
    assert_eq!(client.stats().sampled_out, 100);
}

/// Validates that a healthy collector receives every event.
///
/// # Test Steps
/// 1. Sample everything against an always-2xx transport
/// 2. Post 100 events and wait for the deliveries to settle
/// 3. Verify 100 deliveries and a closed circuit with no failures
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_sample_rate_delivers_everything() {
    let transport = RecordingTransport::new(200);
    let client =
        client(config().sample_rate(100).build().unwrap(), transport.clone(), &MockClock::new());

    for i in 0..100 {
        client.post_metric("request", json!({"n": i}));
    }
    wait_idle(&client).await;

    assert_eq!(transport.attempts(), 100);
    assert_eq!(client.stats().delivered, 100);
    assert_eq!(client.circuit_state(), Some(CircuitState::Closed));
    assert_eq!(client.circuit_snapshot().unwrap().consecutive_failures, 0);
}

/// Validates that the circuit opens after the threshold and sheds load.
///
/// # Test Steps
/// 1. Post three events against a failing collector with threshold 3
/// 2. Verify the circuit is open
/// 3. Post a fourth event before the recovery timeout
/// 4. Verify the transport saw no fourth attempt
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_open_circuit_stops_delivery_attempts() {
    let transport = RecordingTransport::new(500);
    let client = client(
        config().failure_threshold(3).build().unwrap(),
        transport.clone(),
        &MockClock::new(),
    );

    for _ in 0..3 {
        client.post_metric("request", json!({}));
    }
    wait_idle(&client).await;

    assert_eq!(client.circuit_state(), Some(CircuitState::Open));
    assert_eq!(transport.attempts(), 3);

    client.post_metric("request", json!({}));
    wait_idle(&client).await;

    assert_eq!(transport.attempts(), 3);
    assert_eq!(client.stats().dropped_circuit_open, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_probe_after_recovery_closes_circuit() {
    let clock = MockClock::new();
    let transport = RecordingTransport::new(503);
    let config = config()
        .failure_threshold(1)
        .recovery_timeout(Duration::from_secs(60))
        .build()
        .unwrap();
    let client = client(config, transport.clone(), &clock);

    client.post_metric("request", json!({}));
    wait_idle(&client).await;
    assert_eq!(client.circuit_state(), Some(CircuitState::Open));

    clock.advance_secs(59);
    client.post_metric("request", json!({}));
    wait_idle(&client).await;
    assert_eq!(transport.attempts(), 1);

    clock.advance_secs(1);
    transport.set_status(200);
    client.post_metric("request", json!({}));
    wait_idle(&client).await;

    assert_eq!(transport.attempts(), 2);
    assert_eq!(client.circuit_state(), Some(CircuitState::Closed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_probe_reopens_circuit() {
    let clock = MockClock::new();
    let transport = RecordingTransport::new(500);
    let client = client(config().failure_threshold(2).build().unwrap(), transport.clone(), &clock);

    client.post_metric("request", json!({}));
    client.post_metric("request", json!({}));
    wait_idle(&client).await;
    assert_eq!(client.circuit_state(), Some(CircuitState::Open));

    clock.advance_secs(60);
    client.post_metric("request", json!({}));
    wait_idle(&client).await;

    assert_eq!(transport.attempts(), 3);
    assert_eq!(client.circuit_state(), Some(CircuitState::Open));
    assert!(!client.circuit_snapshot().unwrap().probe_in_flight);
}

/// Validates that only one probe runs while the circuit is half-open.
///
/// # Test Steps
/// 1. Open the circuit, then advance past the recovery timeout
/// 2. Post one event whose delivery is held inside the transport
/// 3. Post more events while the probe is in flight; none reach the transport
/// 4. Release the probe and verify the circuit closes
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_probe_while_half_open() {
    let clock = MockClock::new();
    let (transport, gate) = RecordingTransport::gated(500);
    let client = client(config().failure_threshold(1).build().unwrap(), transport.clone(), &clock);

    client.post_metric("request", json!({}));
    gate.add_permits(1);
    wait_idle(&client).await;
    assert_eq!(client.circuit_state(), Some(CircuitState::Open));

    clock.advance_secs(60);
    transport.set_status(200);
    client.post_metric("request", json!({"probe": true}));
    wait_attempts(&transport, 2).await;
    assert_eq!(client.circuit_state(), Some(CircuitState::HalfOpen));

    for _ in 0..5 {
        client.post_metric("request", json!({}));
    }
    assert_eq!(client.stats().dropped_circuit_open, 5);

    gate.add_permits(1);
    wait_idle(&client).await;

    assert_eq!(transport.attempts(), 2);
    assert_eq!(client.circuit_state(), Some(CircuitState::Closed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_probes_when_single_probe_disabled() {
    let clock = MockClock::new();
    let (transport, gate) = RecordingTransport::gated(500);
    let config = config().failure_threshold(1).single_probe(false).build().unwrap();
    let client = client(config, transport.clone(), &clock);

    client.post_metric("request", json!({}));
    gate.add_permits(1);
    wait_idle(&client).await;

    clock.advance_secs(60);
    transport.set_status(200);
    for _ in 0..3 {
        client.post_metric("request", json!({}));
    }
    wait_attempts(&transport, 4).await;
    gate.add_permits(3);
    wait_idle(&client).await;

    assert_eq!(client.stats().dropped_circuit_open, 0);
    assert_eq!(client.circuit_state(), Some(CircuitState::Closed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disabled_breaker_never_sheds_load() {
    let transport = RecordingTransport::new(500);
    let config = config().circuit_breaker_enabled(false).failure_threshold(1).build().unwrap();
    let client = client(config, transport.clone(), &MockClock::new());

    for _ in 0..10 {
        client.post_metric("request", json!({}));
    }
    wait_idle(&client).await;

    assert_eq!(transport.attempts(), 10);
    assert_eq!(client.circuit_state(), None);
    assert_eq!(client.stats().failed, 10);
}

/// Validates that no failure mode reaches the caller.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_post_metric_absorbs_every_failure_mode() {
    let clock = MockClock::new();

    let no_key = client(AgentConfig::default(), RecordingTransport::new(200), &clock);
    no_key.post_metric("request", json!({}));
    assert_eq!(no_key.stats().skipped_no_key, 1);

    let disabled =
        client(config().enabled(false).build().unwrap(), RecordingTransport::new(200), &clock);
    disabled.post_metric("request", json!({}));
    assert_eq!(disabled.stats().skipped_disabled, 1);

    let transport = RecordingTransport::new(200);
    transport.fail_with(Some(TransportError::Connect("connection refused".into())));
    let erroring = client(config().build().unwrap(), transport.clone(), &clock);
    erroring.post_metric("request", json!({}));
    wait_idle(&erroring).await;
    assert_eq!(erroring.stats().failed, 1);

    transport.fail_with(Some(TransportError::Timeout("read timed out".into())));
    erroring.post_metric("request", json!({}));
    wait_idle(&erroring).await;
    assert_eq!(erroring.stats().failed, 2);

    let rejecting = client(config().build().unwrap(), RecordingTransport::new(422), &clock);
    rejecting.post_metric("request", json!({}));
    wait_idle(&rejecting).await;
    assert_eq!(rejecting.stats().failed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_collector_hits_delivery_deadline() {
    let (transport, _gate) = RecordingTransport::gated(200);
    let config = config()
        .open_timeout(Duration::from_millis(20))
        .read_timeout(Duration::from_millis(20))
        .failure_threshold(1)
        .build()
        .unwrap();
    let client = client(config, transport.clone(), &MockClock::new());

    client.post_metric("request", json!({}));
    wait_idle(&client).await;

    assert_eq!(client.stats().failed, 1);
    assert_eq!(client.circuit_state(), Some(CircuitState::Open));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_in_flight_cap_drops_instead_of_queueing() {
    let (transport, gate) = RecordingTransport::gated(200);
    let config = config().max_in_flight(2).build().unwrap();
    let client = client(config, transport.clone(), &MockClock::new());

    for _ in 0..5 {
        client.post_metric("request", json!({}));
    }

    assert_eq!(client.stats().accepted, 2);
    assert_eq!(client.stats().dropped_capacity, 3);

    gate.add_permits(2);
    wait_idle(&client).await;
    assert_eq!(transport.attempts(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsampled_metric_bypasses_only_sampling() {
    let transport = RecordingTransport::new(200);
    let client =
        client(config().sample_rate(0).build().unwrap(), transport.clone(), &MockClock::new());

    client.post_metric("request", json!({}));
    client.post_unsampled_metric("exception", json!({"message": "boom"}));
    wait_idle(&client).await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, "exception");

    let disabled = client_disabled();
    disabled.post_unsampled_metric("exception", json!({}));
    assert_eq!(disabled.stats().skipped_disabled, 1);
}

fn client_disabled() -> std::sync::Arc<vigil_core::ReportingClient> {
    let config = config().enabled(false).build().unwrap();
    client(config, RecordingTransport::new(200), &MockClock::new())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_envelope_carries_event_payload_and_revision() {
    let transport = RecordingTransport::new(200);
    let client = client(config().build().unwrap(), transport.clone(), &MockClock::new());

    client.post("job", &json!({"queue": "default", "duration_ms": 12.5}));
    wait_idle(&client).await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, "job");
    assert_eq!(sent[0].payload, json!({"queue": "default", "duration_ms": 12.5}));
    assert_eq!(sent[0].revision, "rev-test");
    assert!(chrono::DateTime::parse_from_rfc3339(&sent[0].sent_at).is_ok());
    assert!(sent[0].sent_at.ends_with('Z'));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reset_closes_circuit_and_clears_stats() {
    let transport = RecordingTransport::new(500);
    let config = config().failure_threshold(1).build().unwrap();
    let client = client(config, transport.clone(), &MockClock::new());

    client.post_metric("request", json!({}));
    wait_idle(&client).await;
    assert_eq!(client.circuit_state(), Some(CircuitState::Open));

    client.reset();

    assert_eq!(client.circuit_state(), Some(CircuitState::Closed));
    assert_eq!(client.stats(), ReportingStatsSnapshot::default());

    transport.set_status(200);
    client.post_metric("request", json!({}));
    wait_idle(&client).await;
    assert_eq!(transport.attempts(), 2);
}
