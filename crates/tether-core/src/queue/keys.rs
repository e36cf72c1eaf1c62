//! Store key layout for the queue.
//!
//! ```text
//! {prefix}:pending          JSON [task_id, ...]
//! {prefix}:task:{id}        JSON Task
//! {prefix}:lease:{id}       JSON Lease   (ttl = lease length)
//! {prefix}:result:{id}      JSON Result  (ttl = result retention)
//! ```

use crate::domain::TaskId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    prefix: String,
}

impl QueueKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn pending(&self) -> String {
        format!("{}:pending", self.prefix)
    }

    pub fn task(&self, id: &TaskId) -> String {
        format!("{}:task:{}", self.prefix, id)
    }

    pub fn lease(&self, id: &TaskId) -> String {
        format!("{}{}", self.lease_prefix(), id)
    }

    pub fn lease_prefix(&self) -> String {
        format!("{}:lease:", self.prefix)
    }

    pub fn result(&self, id: &TaskId) -> String {
        format!("{}:result:{}", self.prefix, id)
    }
}
