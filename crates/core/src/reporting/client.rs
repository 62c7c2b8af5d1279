//! Reporting client: the single entry point collaborators call
//!
//! [`ReportingClient::post_metric`] runs the gate in order, stopping at the
//! first step that says no:
//!
//! 1. no API key configured
//! 2. reporting disabled
//! 3. sampled out
//! 4. no free in-flight slot, or circuit open and not yet due for a probe
//! 5. hand off to the dispatcher and return
//!
//! The caller never waits on the network and never sees an error or a panic
//! from this path.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, trace};
use vigil_common::resilience::{
    CallPermission, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState,
    Clock, SystemClock,
};
use vigil_domain::constants::ENV_SAMPLE_RATE;
use vigil_domain::{AgentConfig, MetricEvent, Result, VigilError};

use super::dispatch::{Dispatcher, SharedBreaker};
use super::ports::MetricTransport;
use super::stats::{ReportingStats, ReportingStatsSnapshot};
use crate::revision;
use crate::sampling::{resolve_rate, should_sample, ScopeFilters};

/// Whether the sampling step applies to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sampling {
    Apply,
    Bypass,
}

/// Gatekeeper and dispatcher for metric events
#[derive(Debug)]
pub struct ReportingClient {
    api_key: Option<String>,
    enabled: bool,
    sample_rate: u8,
    revision: String,
    filters: ScopeFilters,
    breaker: Option<SharedBreaker>,
    dispatcher: Dispatcher,
    stats: Arc<ReportingStats>,
}

impl ReportingClient {
    pub fn builder(config: AgentConfig) -> ReportingClientBuilder {
        ReportingClientBuilder::new(config)
    }

    /// Report an event, subject to every gate step.
    pub fn post_metric(&self, event_name: &str, payload: Value) {
        self.guarded(event_name, payload, Sampling::Apply);
    }

    /// Report an event without the sampling step.
    ///
    /// Meant for failure events such as uncaught exceptions; key, enabled
    /// and circuit checks still apply.
    pub fn post_unsampled_metric(&self, event_name: &str, payload: Value) {
        self.guarded(event_name, payload, Sampling::Bypass);
    }

    /// Serialize `payload` and report it. Unserializable payloads are dropped.
    pub fn post<T: Serialize + ?Sized>(&self, event_name: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.post_metric(event_name, value),
            Err(err) => debug!(event = event_name, error = %err, "Dropping unserializable payload"),
        }
    }

    /// Key present and reporting enabled
    pub fn is_active(&self) -> bool {
        self.api_key.is_some() && self.enabled
    }

    /// One sampling draw at the configured rate
    pub fn sample(&self) -> bool {
        should_sample(i64::from(self.sample_rate))
    }

    pub fn sample_rate(&self) -> u8 {
        self.sample_rate
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn filters(&self) -> &ScopeFilters {
        &self.filters
    }

    /// `None` when the circuit breaker is disabled
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.breaker.as_ref().map(|breaker| breaker.state())
    }

    pub fn circuit_snapshot(&self) -> Option<CircuitBreakerSnapshot> {
        self.breaker.as_ref().map(|breaker| breaker.snapshot())
    }

    pub fn stats(&self) -> ReportingStatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliveries currently running in the background
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Close the circuit and zero the counters.
    pub fn reset(&self) {
        if let Some(breaker) = &self.breaker {
            breaker.reset();
        }
        self.stats.reset();
    }

    fn guarded(&self, event_name: &str, payload: Value, sampling: Sampling) {
        let result = catch_unwind(AssertUnwindSafe(|| self.submit(event_name, payload, sampling)));
        if result.is_err() {
            debug!(event = event_name, "Suppressed panic while reporting metric");
        }
    }

    fn submit(&self, event_name: &str, payload: Value, sampling: Sampling) {
        if self.api_key.is_none() {
            self.stats.record_skipped_no_key();
            return;
        }

        if !self.enabled {
            self.stats.record_skipped_disabled();
            return;
        }

        if sampling == Sampling::Apply && !self.sample() {
            self.stats.record_sampled_out();
            return;
        }

        let Some(slot) = self.dispatcher.reserve() else {
            debug!(event = event_name, "In-flight cap reached, dropping event");
            self.stats.record_dropped_capacity();
            return;
        };

        if let Some(breaker) = &self.breaker {
            match breaker.acquire() {
                CallPermission::Allowed => {}
                CallPermission::Probe => {
                    debug!(event = event_name, "Sending circuit breaker probe");
                }
                CallPermission::Rejected => {
                    trace!(event = event_name, "Circuit open, dropping event");
                    self.stats.record_dropped_circuit_open();
                    return;
                }
            }
        }

        let envelope =
            MetricEvent::new(event_name, payload).into_envelope(&self.revision, Utc::now());
        self.stats.record_accepted();
        self.dispatcher.deliver(envelope, slot);
    }
}

/// Builder for [`ReportingClient`]
pub struct ReportingClientBuilder {
    config: AgentConfig,
    transport: Option<Arc<dyn MetricTransport>>,
    handle: Option<Handle>,
    clock: Arc<dyn Clock>,
    revision: Option<String>,
    env_sample_rate: Option<String>,
}

impl ReportingClientBuilder {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            transport: None,
            handle: None,
            clock: Arc::new(SystemClock),
            revision: None,
            env_sample_rate: std::env::var(ENV_SAMPLE_RATE).ok(),
        }
    }

    pub fn transport(mut self, transport: Arc<dyn MetricTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Runtime the deliveries are spawned on
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Clock for the circuit breaker
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the deploy id chain
    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Fallback sample rate used when the config leaves it unset
    pub fn env_sample_rate(mut self, raw: Option<String>) -> Self {
        self.env_sample_rate = raw;
        self
    }

    pub fn build(self) -> Result<ReportingClient> {
        self.config.validate()?;

        let transport = self
            .transport
            .ok_or_else(|| VigilError::Config("a metric transport is required".to_string()))?;
        let handle = match self.handle {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|err| {
                VigilError::Config(format!("no runtime available for deliveries: {err}"))
            })?,
        };

        let settings = &self.config.circuit_breaker;
        let breaker = if settings.enabled {
            let config = CircuitBreakerConfig::builder()
                .failure_threshold(settings.failure_threshold)
                .recovery_timeout(settings.recovery_timeout())
                .single_probe(settings.single_probe)
                .build()
                .map_err(|err| VigilError::Config(err.to_string()))?;
            let breaker = CircuitBreaker::with_clock(config, self.clock)
                .map_err(|err| VigilError::Config(err.to_string()))?;
            Some(Arc::new(breaker))
        } else {
            None
        };

        let transport_settings = &self.config.transport;
        let deadline = transport_settings
            .open_timeout()
            .checked_add(transport_settings.read_timeout())
            .ok_or_else(|| VigilError::Config("transport timeouts are too large".to_string()))?;
        let stats = Arc::new(ReportingStats::new());
        let dispatcher = Dispatcher::new(
            handle,
            transport,
            breaker.clone(),
            Arc::clone(&stats),
            transport_settings.max_in_flight,
            deadline,
        )?;

        let sample_rate = resolve_rate(self.config.sample_rate, self.env_sample_rate.as_deref());
        let revision = match self.revision {
            Some(revision) => revision,
            None => revision::deploy_id(self.config.deploy_id.as_deref()),
        };

        debug!(
            enabled = self.config.enabled,
            sample_rate,
            circuit_breaker = breaker.is_some(),
            revision = %revision,
            "Reporting client configured"
        );

        Ok(ReportingClient {
            api_key: self.config.api_key().map(str::to_string),
            enabled: self.config.enabled,
            sample_rate,
            revision,
            filters: ScopeFilters::from_settings(&self.config.filters),
            breaker,
            dispatcher,
            stats,
        })
    }
}
