use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::QueueError;
use crate::ports::StoreError;

/// Facade-level error returned by [`crate::app::Hub`].
#[derive(Debug, Error)]
pub enum TetherError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("validation failed: {0}")]
    Validation(String),
}

impl From<StoreError> for TetherError {
    fn from(error: StoreError) -> Self {
        TetherError::Queue(QueueError::Store(error))
    }
}

impl TetherError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TetherError::Queue(e) if e.is_not_found())
    }

    pub fn is_lease_conflict(&self) -> bool {
        matches!(
            self,
            TetherError::Queue(QueueError::LeaseConflict { .. } | QueueError::InvalidLease(_))
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, TetherError::Queue(e) if e.is_retryable())
    }
}
