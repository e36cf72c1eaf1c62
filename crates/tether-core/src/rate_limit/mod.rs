//! Rate limiting: sliding windows in the KV store with an in-memory fallback.

mod config;
mod limiter;
mod memory;
mod window;

pub use config::{ChannelLimit, RateLimitConfig};
pub use limiter::RateLimiter;
pub use memory::MemoryWindows;
pub use window::{DecisionSource, RateDecision};
