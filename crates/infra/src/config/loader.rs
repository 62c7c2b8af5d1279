//! Configuration loader
//!
//! Loads agent configuration from environment variables and files.
//!
//! ## Loading Strategy
//! 1. Start from a probed config file, or defaults when none exists
//! 2. Apply environment variables on top; a set variable wins, except
//!    `VIGIL_SAMPLE_RATE`, which never replaces a configured rate
//! 3. Validate the result
//!
//! ## Environment Variables
//! - `VIGIL_API_KEY`: Collector API key
//! - `VIGIL_ENABLED`: Global reporting switch (true/false)
//! - `VIGIL_SAMPLE_RATE`: Percentage of events reported when the file leaves it
//!   unset; invalid values mean 100
//! - `VIGIL_ENV`: `production`, `staging` or `local`
//! - `VIGIL_ENDPOINT`: Explicit collector URL
//! - `VIGIL_DEPLOY_ID`: Deploy identifier
//! - `VIGIL_CIRCUIT_BREAKER_ENABLED`: Circuit breaker switch (true/false)
//! - `VIGIL_CIRCUIT_BREAKER_FAILURE_THRESHOLD`: Failures before opening
//! - `VIGIL_CIRCUIT_BREAKER_RECOVERY_TIMEOUT`: Seconds before a probe
//! - `VIGIL_OPEN_TIMEOUT`: Connect timeout in seconds
//! - `VIGIL_READ_TIMEOUT`: Read timeout in seconds
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./vigil.toml` or `./vigil.json` (current working directory)
//! 2. `../vigil.{toml,json}` and `../../vigil.{toml,json}`
//! 3. Relative to executable location

use std::path::{Path, PathBuf};

use vigil_core::sampling::resolve_rate;
use vigil_domain::constants::{
    ENV_API_KEY, ENV_CIRCUIT_BREAKER_ENABLED, ENV_CIRCUIT_BREAKER_FAILURE_THRESHOLD,
    ENV_CIRCUIT_BREAKER_RECOVERY_TIMEOUT, ENV_DEPLOY_ID, ENV_ENABLED, ENV_ENDPOINT,
    ENV_ENVIRONMENT, ENV_OPEN_TIMEOUT, ENV_READ_TIMEOUT, ENV_SAMPLE_RATE,
};
use vigil_domain::{AgentConfig, Environment, Result, VigilError};

const CONFIG_FILE_NAMES: [&str; 2] = ["vigil.toml", "vigil.json"];

/// Load configuration: probed file (if any) overlaid with the environment.
///
/// # Errors
/// Returns `VigilError::Config` if a found file cannot be parsed, an
/// environment variable holds an invalid value, or the result fails
/// validation.
pub fn load() -> Result<AgentConfig> {
    let base = match probe_config_paths() {
        Some(path) => read_config(&path)?,
        None => {
            tracing::debug!("No config file found, using defaults");
            AgentConfig::default()
        }
    };

    let config = apply_env(base, |key| std::env::var(key).ok())?;
    config.validate()?;
    tracing::info!(
        environment = %config.environment,
        enabled = config.enabled,
        has_api_key = config.api_key().is_some(),
        "Agent configuration loaded"
    );
    Ok(config)
}

/// Load configuration from environment variables over defaults.
///
/// # Errors
/// Returns `VigilError::Config` for invalid values.
pub fn load_from_env() -> Result<AgentConfig> {
    let config = apply_env(AgentConfig::default(), |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `VigilError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or a value fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<AgentConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(VigilError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            VigilError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    let config = read_config(&config_path)?;
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<AgentConfig> {
    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| VigilError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<AgentConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| VigilError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| VigilError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(VigilError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.extend([exe_dir.to_path_buf(), exe_dir.join("..")]);
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Overlay environment values read through `lookup` onto `config`.
pub(crate) fn apply_env<F>(mut config: AgentConfig, lookup: F) -> Result<AgentConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(key) = var(ENV_API_KEY) {
        config.api_key = Some(key);
    }
    if let Some(raw) = var(ENV_ENABLED) {
        config.enabled = parse_bool(&raw);
    }
    if let Some(raw) = var(ENV_SAMPLE_RATE) {
        // A configured rate wins; the variable only fills an unset one.
        config.sample_rate = Some(resolve_rate(config.sample_rate, Some(&raw)));
    }
    if let Some(raw) = var(ENV_ENVIRONMENT) {
        config.environment = raw.parse::<Environment>()?;
    }
    if let Some(endpoint) = var(ENV_ENDPOINT) {
        config.endpoint = Some(endpoint);
    }
    if let Some(deploy_id) = var(ENV_DEPLOY_ID) {
        config.deploy_id = Some(deploy_id);
    }
    if let Some(raw) = var(ENV_CIRCUIT_BREAKER_ENABLED) {
        config.circuit_breaker.enabled = parse_bool(&raw);
    }
    if let Some(raw) = var(ENV_CIRCUIT_BREAKER_FAILURE_THRESHOLD) {
        config.circuit_breaker.failure_threshold = raw.parse::<u32>().map_err(|e| {
            VigilError::Config(format!("Invalid {ENV_CIRCUIT_BREAKER_FAILURE_THRESHOLD}: {e}"))
        })?;
    }
    if let Some(raw) = var(ENV_CIRCUIT_BREAKER_RECOVERY_TIMEOUT) {
        config.circuit_breaker.recovery_timeout_secs = raw.parse::<u64>().map_err(|e| {
            VigilError::Config(format!("Invalid {ENV_CIRCUIT_BREAKER_RECOVERY_TIMEOUT}: {e}"))
        })?;
    }
    if let Some(raw) = var(ENV_OPEN_TIMEOUT) {
        config.transport.open_timeout_secs = parse_seconds(ENV_OPEN_TIMEOUT, &raw)?;
    }
    if let Some(raw) = var(ENV_READ_TIMEOUT) {
        config.transport.read_timeout_secs = parse_seconds(ENV_READ_TIMEOUT, &raw)?;
    }

    Ok(config)
}

fn parse_seconds(key: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|e| VigilError::Config(format!("Invalid {key}: {e}")))
}

/// Parse a boolean flag
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Duration;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;
    use vigil_domain::constants::LOCAL_ENDPOINT;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_bool() {
        for raw in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_bool(raw), "{raw}");
        }
        for raw in ["0", "false", "no", "off", "maybe"] {
            assert!(!parse_bool(raw), "{raw}");
        }
    }

    #[test]
    fn test_apply_env_sets_every_field() {
        let config = apply_env(
            AgentConfig::default(),
            vars(&[
                ("VIGIL_API_KEY", "env-key"),
                ("VIGIL_ENABLED", "false"),
                ("VIGIL_SAMPLE_RATE", "25"),
                ("VIGIL_ENV", "local"),
                ("VIGIL_DEPLOY_ID", "deploy-7"),
                ("VIGIL_CIRCUIT_BREAKER_ENABLED", "off"),
                ("VIGIL_CIRCUIT_BREAKER_FAILURE_THRESHOLD", "5"),
                ("VIGIL_CIRCUIT_BREAKER_RECOVERY_TIMEOUT", "30"),
                ("VIGIL_OPEN_TIMEOUT", "0.5"),
                ("VIGIL_READ_TIMEOUT", "2"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_key(), Some("env-key"));
        assert!(!config.enabled);
        assert_eq!(config.sample_rate, Some(25));
        assert_eq!(config.environment, Environment::Local);
        assert_eq!(config.endpoint_url(), LOCAL_ENDPOINT);
        assert_eq!(config.deploy_id.as_deref(), Some("deploy-7"));
        assert!(!config.circuit_breaker.enabled);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_timeout(), Duration::from_secs(30));
        assert_eq!(config.transport.open_timeout(), Duration::from_millis(500));
        assert_eq!(config.transport.read_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_sample_rate_fails_open() {
        let config =
            apply_env(AgentConfig::default(), vars(&[("VIGIL_SAMPLE_RATE", "lots")])).unwrap();
        assert_eq!(config.sample_rate, Some(100));
    }

    #[test]
    fn test_invalid_sample_rate_keeps_configured_zero() {
        let file: AgentConfig = toml::from_str("sample_rate = 0
").unwrap();
        let config = apply_env(file, vars(&[("VIGIL_SAMPLE_RATE", "lots")])).unwrap();
        assert_eq!(config.sample_rate, Some(0));
    }

    #[test]
    fn test_invalid_threshold_is_config_error() {
        let err = apply_env(
            AgentConfig::default(),
            vars(&[("VIGIL_CIRCUIT_BREAKER_FAILURE_THRESHOLD", "three")]),
        )
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_unknown_environment_is_config_error() {
        let err = apply_env(AgentConfig::default(), vars(&[("VIGIL_ENV", "mars")])).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let file: AgentConfig =
            toml::from_str("api_key = \"file-key\"\nenabled = true\n").unwrap();
        let config = apply_env(
            file,
            vars(&[("VIGIL_API_KEY", "env-key"), ("VIGIL_ENABLED", "false")]),
        )
        .unwrap();

        assert_eq!(config.api_key(), Some("env-key"));
        assert!(!config.enabled);
    }

    #[test]
    fn test_configured_sample_rate_wins_over_env() {
        let file: AgentConfig = toml::from_str("sample_rate = 10
").unwrap();
        let config = apply_env(file, vars(&[("VIGIL_SAMPLE_RATE", "90")])).unwrap();
        assert_eq!(config.sample_rate, Some(10));
    }

    #[test]
    fn test_load_from_env_reads_process_environment() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("VIGIL_API_KEY", "process-key");
        std::env::set_var("VIGIL_CIRCUIT_BREAKER_FAILURE_THRESHOLD", "7");

        let result = load_from_env();

        std::env::remove_var("VIGIL_API_KEY");
        std::env::remove_var("VIGIL_CIRCUIT_BREAKER_FAILURE_THRESHOLD");

        let config = result.expect("config from env");
        assert_eq!(config.api_key(), Some("process-key"));
        assert_eq!(config.circuit_breaker.failure_threshold, 7);
    }

    #[test]
    fn test_load_from_env_rejects_zero_threshold() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("VIGIL_CIRCUIT_BREAKER_FAILURE_THRESHOLD", "0");
        let result = load_from_env();
        std::env::remove_var("VIGIL_CIRCUIT_BREAKER_FAILURE_THRESHOLD");

        assert!(matches!(result, Err(VigilError::Config(_))), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_json() {
        let json_content = r#"{
            "api_key": "json-key",
            "sample_rate": 50,
            "environment": "staging",
            "transport": { "open_timeout_secs": 0.25 }
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        let config = result.expect("Should load config from JSON file");
        assert_eq!(config.api_key(), Some("json-key"));
        assert_eq!(config.sample_rate, Some(50));
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.transport.open_timeout(), Duration::from_millis(250));
        assert_eq!(config.transport.read_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_file_rejects_out_of_range_rate() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"sample_rate = 150\n").unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        assert!(matches!(result, Err(VigilError::Config(_))));
    }

    #[test]
    fn test_load_from_file_missing_path() {
        let result = load_from_file(Some(PathBuf::from("/definitely/not/here/vigil.toml")));
        assert!(matches!(result, Err(VigilError::Config(msg)) if msg.contains("not found")));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = parse_config("", Path::new("vigil.yaml"));
        assert!(matches!(result, Err(VigilError::Config(msg)) if msg.contains("yaml")));
    }
}
