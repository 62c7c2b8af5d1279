//! Resilience patterns for protecting a host process from a failing dependency
//!
//! - **Circuit Breaker**: stops calling a dependency after repeated failures
//!   and lets a probe through once the recovery timeout has elapsed
//! - **Bulkhead**: caps concurrent operations and rejects, rather than queues,
//!   work beyond the cap
//!
//! Both are generic over the operation being guarded. The breaker exposes
//! explicit gate and record calls instead of wrapping a closure, so the
//! outcome can be recorded from a different task than the one that asked for
//! permission.

pub mod bulkhead;
pub mod circuit_breaker;

pub use bulkhead::{Bulkhead, BulkheadConfig, BulkheadPermit};
pub use circuit_breaker::{
    CallPermission, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitBreakerSnapshot, CircuitState, Clock, ConfigError, ConfigResult, MockClock,
    SystemClock,
};
