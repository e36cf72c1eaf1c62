//! Domain model (IDs, task body, lease, result, errors).
//!
//! ストアに保存される値はすべてここで定義し、serde で JSON 化する。

pub mod errors;
pub mod ids;
pub mod lease;
pub mod outcome;
pub mod state;
pub mod task;

pub use self::errors::{ErrorKind, QueueError};
pub use self::ids::{ClaimNonce, Id, IdMarker, TaskId, WorkerId};
pub use self::lease::Lease;
pub use self::outcome::TaskResult;
pub use self::state::{TaskStatus, UnknownStatus};
pub use self::task::Task;
