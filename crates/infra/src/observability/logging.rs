//! Structured logging for the agent
//!
//! The agent only emits `tracing` events; installing a subscriber is left to
//! the host unless it asks the agent to do it through [`init_logging`].
//! Installation never replaces a subscriber the host already set.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use vigil_domain::constants::ENV_LOG;

const DEFAULT_LOG_TARGETS: [&str; 4] =
    ["vigil_common", "vigil_core", "vigil_domain", "vigil_infra"];

/// Configuration for the logging subsystem.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: Level,
    /// Output logs in JSON format for structured logging
    pub json_format: bool,
    /// Enable ANSI color codes in console output
    pub colorize: bool,
    /// Target modules to log (None = the agent crates)
    pub targets: Option<Vec<String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: Level::INFO, json_format: false, colorize: true, targets: None }
    }
}

const fn level_to_str(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Builds the `target=level` directive list for `EnvFilter`.
fn build_filter_string<S: AsRef<str>>(targets: &[S], level: Level) -> String {
    let level = level_to_str(level);
    targets
        .iter()
        .map(|target| format!("{}={level}", target.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(directives) = std::env::var(ENV_LOG) {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }

    let directives = match &config.targets {
        Some(targets) if !targets.is_empty() => build_filter_string(targets, config.level),
        _ => build_filter_string(&DEFAULT_LOG_TARGETS, config.level),
    };
    EnvFilter::new(directives)
}

/// Install a global `tracing` subscriber for the agent.
///
/// `VIGIL_LOG` takes precedence over the configured targets when it holds a
/// valid filter.
///
/// # Returns
/// `true` if the subscriber was installed, `false` if one was already set.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.colorize)
        .with_target(true)
        .with_line_number(true);

    let layer = if config.json_format {
        layer.json().flatten_event(true).boxed()
    } else {
        layer.boxed()
    };

    tracing_subscriber::registry().with(env_filter(config)).with(layer).try_init().is_ok()
}
