//! Resilience primitives: circuit breakers keyed by dependency name.

mod circuit_breaker;
mod config;
mod registry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState, CircuitStats};
pub use config::{CircuitBreakerConfig, CircuitBreakerSettings};
pub use registry::CircuitBreakerRegistry;
