//! Agent facade: configuration, runtime, transport and client in one place
//!
//! ```no_run
//! use std::time::Duration;
//! use serde_json::json;
//!
//! let agent = vigil_infra::Agent::from_env()?;
//! agent.post_metric("deploy", json!({"version": "1.4.2"}));
//! let stats = agent.shutdown(Duration::from_secs(2));
//! println!("delivered {}", stats.delivered);
//! # Ok::<(), vigil_domain::VigilError>(())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};
use vigil_core::{
    Instrumentation, InstrumentationBuilder, MetricTransport, ReportingClient,
    ReportingStatsSnapshot,
};
use vigil_domain::{AgentConfig, Result};

use crate::config;
use crate::runtime::BackgroundRuntime;
use crate::transport::HttpTransport;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running reporting agent
///
/// Owns the background runtime; dropping the agent stops it without waiting
/// for in-flight deliveries. Use [`Agent::shutdown`] to give them a grace
/// period.
pub struct Agent {
    client: Arc<ReportingClient>,
    runtime: Option<BackgroundRuntime>,
}

impl Agent {
    /// Start an agent that reports over HTTPS.
    ///
    /// # Errors
    /// Returns `VigilError::Config` for an invalid configuration.
    pub fn start(config: AgentConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Start an agent that delivers through `transport`.
    ///
    /// # Errors
    /// Returns `VigilError::Config` for an invalid configuration.
    pub fn with_transport(
        config: AgentConfig,
        transport: Arc<dyn MetricTransport>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = BackgroundRuntime::new(config.transport.worker_threads)?;

        let client =
            ReportingClient::builder(config).transport(transport).runtime(runtime.handle()).build();
        let client = match client {
            Ok(client) => client,
            Err(err) => {
                runtime.shutdown();
                return Err(err);
            }
        };

        info!(
            active = client.is_active(),
            sample_rate = client.sample_rate(),
            revision = client.revision(),
            "Vigil agent started"
        );

        Ok(Self { client: Arc::new(client), runtime: Some(runtime) })
    }

    /// Start an agent from the probed config file and `VIGIL_*` variables.
    ///
    /// # Errors
    /// Returns `VigilError::Config` if loading or validation fails.
    pub fn from_env() -> Result<Self> {
        Self::start(config::load()?)
    }

    pub fn client(&self) -> &Arc<ReportingClient> {
        &self.client
    }

    /// Builder for request/job instrumentation bound to this agent.
    pub fn instrumentation(&self) -> InstrumentationBuilder {
        Instrumentation::builder(Arc::clone(&self.client))
    }

    /// See [`ReportingClient::post_metric`].
    pub fn post_metric(&self, event_name: &str, payload: Value) {
        self.client.post_metric(event_name, payload);
    }

    /// Wait up to `grace` for in-flight deliveries, then stop the runtime.
    ///
    /// Deliveries still running after `grace` are abandoned.
    pub fn shutdown(mut self, grace: Duration) -> ReportingStatsSnapshot {
        let deadline = Instant::now() + grace;
        while self.client.in_flight() > 0 && Instant::now() < deadline {
            std::thread::sleep(DRAIN_POLL_INTERVAL);
        }

        let abandoned = self.client.in_flight();
        if abandoned > 0 {
            warn!(abandoned, "Shutting down with deliveries in flight");
        }

        let stats = self.client.stats();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown();
        }
        debug!(delivered = stats.delivered, failed = stats.failed, "Vigil agent stopped");
        stats
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("client", &self.client)
            .field("running", &self.runtime.is_some())
            .finish()
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown();
        }
    }
}
