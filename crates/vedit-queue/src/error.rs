//! Queue error types.

use thiserror::Error;

use vedit_models::{JobId, ModelError};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// The job changed underneath every attempt to update it.
    #[error("Job {job_id} was modified concurrently {attempts} times; giving up")]
    Conflict { job_id: JobId, attempts: u32 },

    #[error("Rejected job update: {0}")]
    Rejected(#[from] ModelError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }
}
