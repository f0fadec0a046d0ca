use thiserror::Error;

/// Error taxonomy for queue operations.
///
/// Execution failures (non-zero exit, timeout, spawn error) are not errors at
/// this level; they are outcomes fed into the retry policy by the worker.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Caller-fixable input problem. Surfaced immediately, never retried.
    #[error("{0}")]
    Validation(String),

    /// Unknown job id.
    #[error("job '{0}' not found")]
    NotFound(String),

    /// A single-job DLQ operation hit a job outside the `dead` state.
    #[error("job '{id}' is not in the dead letter queue (current state: {state})")]
    InvalidState { id: String, state: String },

    /// Persistence-layer fault. Fatal to the operation attempting it; the
    /// worker loop logs it and keeps running.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl QueueError {
    pub fn validation(message: impl Into<String>) -> Self {
        QueueError::Validation(message.into())
    }
}
