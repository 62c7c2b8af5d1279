//! Bulkhead pattern for capping concurrent operations
//!
//! Unlike a queueing semaphore, this bulkhead never waits: when every permit
//! is taken the caller is told so immediately and is expected to drop the
//! work. Permits are owned, so they can travel into a spawned task and are
//! released when that task drops them.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use super::circuit_breaker::{ConfigError, ConfigResult};

/// Configuration for bulkhead behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkheadConfig {
    /// Maximum number of concurrent operations allowed
    pub max_concurrent: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_concurrent: 64 }
    }
}

impl BulkheadConfig {
    pub fn new(max_concurrent: usize) -> Self {
        Self { max_concurrent }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                message: "max_concurrent must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Permit for one operation; capacity is returned on drop.
#[derive(Debug)]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
}

/// Non-blocking concurrency limiter
#[derive(Clone)]
pub struct Bulkhead {
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
}

impl Bulkhead {
    /// Create a new bulkhead with the given configuration
    pub fn new(config: BulkheadConfig) -> ConfigResult<Self> {
        config.validate()?;

        Ok(Self { semaphore: Arc::new(Semaphore::new(config.max_concurrent)), config })
    }

    /// Take a permit if one is free, without waiting.
    pub fn try_acquire(&self) -> Option<BulkheadPermit> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Some(BulkheadPermit { _permit: permit }),
            Err(_) => {
                trace!(max_concurrent = self.config.max_concurrent, "Bulkhead at capacity");
                None
            }
        }
    }

    /// Get the current number of concurrent operations
    pub fn current_concurrent(&self) -> usize {
        self.config.max_concurrent.saturating_sub(self.semaphore.available_permits())
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("max_concurrent", &self.config.max_concurrent)
            .field("current_concurrent", &self.current_concurrent())
            .finish()
    }
}
