//! Circuit breaker for guarding calls to an unreliable dependency
//!
//! The breaker counts *consecutive* failures. Once the count reaches the
//! configured threshold the circuit opens and callers are turned away without
//! touching the dependency. There is no background timer: the transition to
//! half-open is driven by the next caller once the recovery timeout has
//! elapsed since the last failure, and that caller's call becomes the probe.
//!
//! ```text
//! Closed   --(failures >= threshold)------------------> Open
//! Open     --(recovery timeout elapsed, next caller)---> HalfOpen
//! HalfOpen --(success)---------------------------------> Closed
//! HalfOpen --(failure)---------------------------------> Open
//! ```
//!
//! All state lives behind a single mutex so the failure counter and the state
//! can never disagree under concurrent updates.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Production code uses [`SystemClock`]; tests drive [`MockClock`] forward to
/// exercise recovery timeouts without sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        let millis =
            self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed time, so a test can keep one handle and
/// hand another to the breaker.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by whole seconds
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + self.elapsed()
    }
}

//==============================================================================
// Configuration
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, a probe is testing recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time since the last failure before a probe may be attempted
    pub recovery_timeout: Duration,
    /// Turn away further callers while a half-open probe is in flight
    pub single_probe: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 3, recovery_timeout: Duration::from_secs(60), single_probe: true }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    pub fn single_probe(mut self, single_probe: bool) -> Self {
        self.config.single_probe = single_probe;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Outcome of asking the breaker whether a call may proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPermission {
    /// Circuit closed, call proceeds normally
    Allowed,
    /// Circuit was reset-eligible; this call is the recovery probe
    Probe,
    /// Call must be dropped without touching the dependency
    Rejected,
}

impl CallPermission {
    pub fn is_permitted(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Point-in-time view of the breaker state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
    pub probe_in_flight: bool,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    last_success_at: Option<Instant>,
    probe_in_flight: bool,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            last_success_at: None,
            probe_in_flight: false,
        }
    }

    fn reset_eligible(&self, now: Instant, recovery_timeout: Duration) -> bool {
        if self.state != CircuitState::Open {
            return false;
        }
        match self.last_failure_at {
            Some(failed_at) => now.saturating_duration_since(failed_at) >= recovery_timeout,
            None => false,
        }
    }
}

/// Consecutive-failure circuit breaker
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    clock: C,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("consecutive_failures", &inner.consecutive_failures)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker with the given configuration using system
    /// clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self {
            config: CircuitBreakerConfig::default(),
            inner: Mutex::new(BreakerState::closed()),
            clock: SystemClock,
        }
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, inner: Mutex::new(BreakerState::closed()), clock })
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Gate a call: one lock acquisition, no I/O.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to half-open
    /// here and the caller receives [`CallPermission::Probe`]. With
    /// `single_probe` enabled, callers arriving while that probe is in flight
    /// are rejected; otherwise they are let through as additional probes.
    pub fn acquire(&self) -> CallPermission {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => CallPermission::Allowed,
            CircuitState::Open => {
                if inner.reset_eligible(now, self.config.recovery_timeout) {
                    Self::enter_half_open(&mut inner);
                    CallPermission::Probe
                } else {
                    CallPermission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if self.config.single_probe && inner.probe_in_flight {
                    CallPermission::Rejected
                } else {
                    inner.probe_in_flight = true;
                    CallPermission::Probe
                }
            }
        }
    }

    /// Whether an open circuit has waited long enough to probe.
    ///
    /// False in any other state and when no failure was ever recorded.
    pub fn should_attempt_reset(&self) -> bool {
        let now = self.clock.now();
        self.inner.lock().reset_eligible(now, self.config.recovery_timeout)
    }

    /// Move an open circuit to half-open.
    ///
    /// Returns `true` only for the caller that performed the transition.
    pub fn transition_to_half_open(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return false;
        }
        Self::enter_half_open(&mut inner);
        true
    }

    fn enter_half_open(inner: &mut BreakerState) {
        inner.state = CircuitState::HalfOpen;
        inner.probe_in_flight = true;
        info!(failures = inner.consecutive_failures, "Circuit breaker half-open, probing");
    }

    /// Record a successful call: closes the circuit from any state.
    pub fn record_success(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let previous = inner.state;

        inner.consecutive_failures = 0;
        inner.last_success_at = Some(now);
        inner.probe_in_flight = false;
        inner.state = CircuitState::Closed;

        if previous != CircuitState::Closed {
            info!(from = %previous, "Circuit breaker closed");
        }
    }

    /// Record a failed call.
    ///
    /// A failure while half-open reopens immediately; while closed the
    /// circuit opens once consecutive failures reach the threshold.
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure_at = Some(now);
        inner.probe_in_flight = false;

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                warn!(
                    failures = inner.consecutive_failures,
                    "Circuit breaker probe failed, reopened"
                );
            }
            CircuitState::Closed if inner.consecutive_failures >= self.config.failure_threshold => {
                inner.state = CircuitState::Open;
                warn!(failures = inner.consecutive_failures, "Circuit breaker opened");
            }
            CircuitState::Closed | CircuitState::Open => {
                debug!(
                    failures = inner.consecutive_failures,
                    state = %inner.state,
                    "Circuit breaker failure recorded"
                );
            }
        }
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Snapshot of the full breaker state taken under one lock
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock();
        CircuitBreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure_at: inner.last_failure_at,
            last_success_at: inner.last_success_at,
            probe_in_flight: inner.probe_in_flight,
        }
    }

    /// Reset the circuit breaker to its initial closed state
    pub fn reset(&self) {
        *self.inner.lock() = BreakerState::closed();
        info!("Circuit breaker manually reset to closed state");
    }
}
