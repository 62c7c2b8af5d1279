//! Agent constants
//!
//! Centralized location for endpoints, defaults and environment variable
//! names shared by the agent crates.

// Collector endpoints
pub const PRODUCTION_ENDPOINT: &str = "https://collector.vigil.dev/api/v1/events";
pub const STAGING_ENDPOINT: &str = "https://collector.staging.vigil.dev/api/v1/events";
pub const LOCAL_ENDPOINT: &str = "http://localhost:3000/api/v1/events";

// Reporting defaults
pub const DEFAULT_SAMPLE_RATE: u8 = 100;
pub const MAX_SAMPLE_RATE: u8 = 100;
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_RECOVERY_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_OPEN_TIMEOUT_SECS: f64 = 1.0;
pub const DEFAULT_READ_TIMEOUT_SECS: f64 = 1.0;
pub const MAX_TIMEOUT_SECS: f64 = 3_600.0;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;
pub const DEFAULT_WORKER_THREADS: usize = 2;

// Environment variables
pub const ENV_API_KEY: &str = "VIGIL_API_KEY";
pub const ENV_ENABLED: &str = "VIGIL_ENABLED";
pub const ENV_SAMPLE_RATE: &str = "VIGIL_SAMPLE_RATE";
pub const ENV_ENVIRONMENT: &str = "VIGIL_ENV";
pub const ENV_ENDPOINT: &str = "VIGIL_ENDPOINT";
pub const ENV_DEPLOY_ID: &str = "VIGIL_DEPLOY_ID";
pub const ENV_CIRCUIT_BREAKER_ENABLED: &str = "VIGIL_CIRCUIT_BREAKER_ENABLED";
pub const ENV_CIRCUIT_BREAKER_FAILURE_THRESHOLD: &str = "VIGIL_CIRCUIT_BREAKER_FAILURE_THRESHOLD";
pub const ENV_CIRCUIT_BREAKER_RECOVERY_TIMEOUT: &str = "VIGIL_CIRCUIT_BREAKER_RECOVERY_TIMEOUT";
pub const ENV_OPEN_TIMEOUT: &str = "VIGIL_OPEN_TIMEOUT";
pub const ENV_READ_TIMEOUT: &str = "VIGIL_READ_TIMEOUT";
pub const ENV_LOG: &str = "VIGIL_LOG";

/// Platform variables consulted, in order, when no deploy id is configured.
pub const DEPLOY_ID_ENV_VARS: &[&str] = &[
    ENV_DEPLOY_ID,
    "HEROKU_SLUG_COMMIT",
    "RENDER_GIT_COMMIT",
    "GIT_COMMIT",
    "SOURCE_VERSION",
    "REVISION",
];

// Event names
pub const EVENT_REQUEST: &str = "request";
pub const EVENT_JOB: &str = "job";
pub const EVENT_EXCEPTION: &str = "exception";
