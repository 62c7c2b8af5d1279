//! Agent configuration structures
//!
//! The configuration is owned by the host application and consumed by the
//! reporting pipeline. Validation happens once, when the configuration is
//! built or loaded; it is the only place the agent reports an error to its
//! host.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_MAX_IN_FLIGHT, DEFAULT_OPEN_TIMEOUT_SECS,
    DEFAULT_READ_TIMEOUT_SECS, DEFAULT_RECOVERY_TIMEOUT_SECS, DEFAULT_WORKER_THREADS,
    LOCAL_ENDPOINT, MAX_SAMPLE_RATE, MAX_TIMEOUT_SECS, PRODUCTION_ENDPOINT, STAGING_ENDPOINT,
};
use crate::errors::{Result, VigilError};

/// Collector environment the agent reports to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
    Local,
}

impl Environment {
    /// Collector URL for this environment.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_ENDPOINT,
            Self::Staging => STAGING_ENDPOINT,
            Self::Local => LOCAL_ENDPOINT,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Staging => write!(f, "staging"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl FromStr for Environment {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "local" | "development" | "dev" => Ok(Self::Local),
            other => Err(VigilError::Config(format!("Unknown environment: {other}"))),
        }
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Whether the breaker guards deliveries at all
    pub enabled: bool,
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Seconds to wait after the last failure before probing
    pub recovery_timeout_secs: u64,
    /// Allow a single probe at a time while half-open
    pub single_probe: bool,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout_secs: DEFAULT_RECOVERY_TIMEOUT_SECS,
            single_probe: true,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

/// Delivery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Connection (open) timeout in seconds
    pub open_timeout_secs: f64,
    /// Response read timeout in seconds
    pub read_timeout_secs: f64,
    /// Hard cap on concurrently in-flight deliveries
    pub max_in_flight: usize,
    /// Worker threads of the background delivery runtime
    pub worker_threads: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            open_timeout_secs: DEFAULT_OPEN_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

impl TransportSettings {
    pub fn open_timeout(&self) -> Duration {
        seconds_or(self.open_timeout_secs, DEFAULT_OPEN_TIMEOUT_SECS)
    }

    pub fn read_timeout(&self) -> Duration {
        seconds_or(self.read_timeout_secs, DEFAULT_READ_TIMEOUT_SECS)
    }
}

fn seconds_or(value: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .unwrap_or_else(|| Duration::from_secs_f64(fallback))
}

/// Name pattern lists used to filter instrumented units of work
///
/// Patterns are `Scope` or `Scope#subscope` strings with optional `*`
/// wildcards, e.g. `Admin::*` or `HealthController#*`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub excluded_actions: Vec<String>,
    pub exclusive_actions: Vec<String>,
    pub excluded_jobs: Vec<String>,
    pub exclusive_jobs: Vec<String>,
}

/// Top-level agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Collector API key; reporting is a no-op without it
    pub api_key: Option<String>,
    /// Global reporting switch
    pub enabled: bool,
    /// Percentage of events reported (0-100); unset defers to the environment
    pub sample_rate: Option<u8>,
    /// Collector environment
    pub environment: Environment,
    /// Explicit collector URL, overrides `environment`
    pub endpoint: Option<String>,
    /// Deploy identifier attached to every event
    pub deploy_id: Option<String>,
    pub circuit_breaker: CircuitBreakerSettings,
    pub transport: TransportSettings,
    pub filters: FilterSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            enabled: true,
            sample_rate: None,
            environment: Environment::default(),
            endpoint: None,
            deploy_id: None,
            circuit_breaker: CircuitBreakerSettings::default(),
            transport: TransportSettings::default(),
            filters: FilterSettings::default(),
        }
    }
}

impl AgentConfig {
    /// Create a configuration builder
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// API key, if one is configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|key| !key.is_empty())
    }

    /// Collector URL: the explicit override, or the environment's endpoint.
    pub fn endpoint_url(&self) -> &str {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.environment.endpoint())
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `VigilError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if let Some(rate) = self.sample_rate {
            validate_sample_rate(i64::from(rate))?;
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(VigilError::Config(
                "circuit_breaker.failure_threshold must be greater than 0".to_string(),
            ));
        }

        validate_timeout("transport.open_timeout_secs", self.transport.open_timeout_secs)?;
        validate_timeout("transport.read_timeout_secs", self.transport.read_timeout_secs)?;

        if self.transport.max_in_flight == 0 {
            return Err(VigilError::Config(
                "transport.max_in_flight must be greater than 0".to_string(),
            ));
        }

        if self.transport.worker_threads == 0 {
            return Err(VigilError::Config(
                "transport.worker_threads must be greater than 0".to_string(),
            ));
        }

        if let Some(endpoint) = self.endpoint.as_deref() {
            let endpoint = endpoint.trim();
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(VigilError::Config(format!(
                    "endpoint must be an http(s) URL, got '{endpoint}'"
                )));
            }
        }

        Ok(())
    }
}

/// Check that a sample rate is a percentage.
///
/// # Errors
/// Returns `VigilError::Config` when `rate` is outside `[0, 100]`.
pub fn validate_sample_rate(rate: i64) -> Result<u8> {
    u8::try_from(rate).ok().filter(|rate| *rate <= MAX_SAMPLE_RATE).ok_or_else(|| {
        VigilError::Config(format!(
            "sample_rate must be an integer between 0 and {MAX_SAMPLE_RATE}, got {rate}"
        ))
    })
}

fn validate_timeout(field: &str, seconds: f64) -> Result<()> {
    if seconds.is_finite() && seconds > 0.0 && seconds <= MAX_TIMEOUT_SECS {
        Ok(())
    } else {
        Err(VigilError::Config(format!(
            "{field} must be a number of seconds in (0, {MAX_TIMEOUT_SECS}], got {seconds}"
        )))
    }
}

/// Builder for [`AgentConfig`]
#[derive(Debug, Default)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
    raw_sample_rate: Option<i64>,
}

impl AgentConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Percentage of events to report. Checked by [`Self::build`].
    pub fn sample_rate(mut self, rate: i64) -> Self {
        self.raw_sample_rate = Some(rate);
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    pub fn deploy_id(mut self, deploy_id: impl Into<String>) -> Self {
        self.config.deploy_id = Some(deploy_id.into());
        self
    }

    pub fn circuit_breaker_enabled(mut self, enabled: bool) -> Self {
        self.config.circuit_breaker.enabled = enabled;
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.circuit_breaker.failure_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.circuit_breaker.recovery_timeout_secs = timeout.as_secs();
        self
    }

    pub fn single_probe(mut self, single_probe: bool) -> Self {
        self.config.circuit_breaker.single_probe = single_probe;
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.open_timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.read_timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.config.transport.max_in_flight = max;
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.transport.worker_threads = threads;
        self
    }

    pub fn filters(mut self, filters: FilterSettings) -> Self {
        self.config.filters = filters;
        self
    }

    /// Validate and produce the configuration
    ///
    /// # Errors
    /// Returns `VigilError::Config` for out-of-range values.
    pub fn build(mut self) -> Result<AgentConfig> {
        if let Some(rate) = self.raw_sample_rate {
            self.config.sample_rate = Some(validate_sample_rate(rate)?);
        }
        self.config.validate()?;
        Ok(self.config)
    }
}
