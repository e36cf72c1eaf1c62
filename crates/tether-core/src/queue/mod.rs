//! Queue module: lease-based task queue on top of the KV store port.

mod config;
mod keys;
mod task_queue;

pub use config::{MAX_LEASE_SECS, QueueConfig};
pub use keys::QueueKeys;
pub use task_queue::{ClaimOutcome, TaskQueue};
