//! Background runtime that carries metric deliveries
//!
//! Hosts are not required to run tokio. The agent owns a small multi-thread
//! runtime so deliveries never borrow the host's threads.

use tokio::runtime::{Builder, Handle, Runtime};
use vigil_domain::{Result, VigilError};

const THREAD_NAME: &str = "vigil-reporter";

/// Owned tokio runtime for delivery tasks
#[derive(Debug)]
pub struct BackgroundRuntime {
    runtime: Runtime,
}

impl BackgroundRuntime {
    /// Create a runtime with `worker_threads` workers.
    ///
    /// # Errors
    /// Returns `VigilError::Config` for zero workers and `VigilError::Internal`
    /// if the runtime cannot be created.
    pub fn new(worker_threads: usize) -> Result<Self> {
        if worker_threads == 0 {
            return Err(VigilError::Config("worker_threads must be greater than 0".to_string()));
        }

        let runtime = Builder::new_multi_thread()
            .thread_name(THREAD_NAME)
            .worker_threads(worker_threads)
            .enable_all()
            .build()
            .map_err(|e| VigilError::Internal(format!("Failed to start reporter runtime: {e}")))?;

        Ok(Self { runtime })
    }

    /// Handle for spawning onto this runtime.
    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    /// Stop the runtime without waiting for outstanding tasks.
    ///
    /// Safe to call from inside another runtime's context.
    pub fn shutdown(self) {
        self.runtime.shutdown_background();
    }
}
