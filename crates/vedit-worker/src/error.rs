//! Worker error types.

use thiserror::Error;

use vedit_media::{MediaError, MediaResult};
use vedit_models::{JobStage, ModelError};
use vedit_queue::QueueError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// A pipeline stage raised; the job fails with this message.
    #[error("{stage} failed: {source}")]
    StageFailed {
        stage: JobStage,
        #[source]
        source: MediaError,
    },

    #[error("Invalid job: {0}")]
    InvalidJob(#[from] ModelError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn stage_failed(stage: JobStage, source: MediaError) -> Self {
        Self::StageFailed { stage, source }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// The pipeline stage that raised, if any.
    pub fn stage(&self) -> Option<JobStage> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Attach the running stage to media errors.
pub trait StageResultExt<T> {
    fn in_stage(self, stage: JobStage) -> WorkerResult<T>;
}

impl<T> StageResultExt<T> for MediaResult<T> {
    fn in_stage(self, stage: JobStage) -> WorkerResult<T> {
        self.map_err(|e| WorkerError::stage_failed(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failure_message_names_stage() {
        let err: WorkerResult<()> =
            Err(MediaError::ffmpeg_failed("encoder exited", None, Some(1)))
                .in_stage(JobStage::ExportingVideo);
        let message = err.unwrap_err().to_string();
        assert_eq!(
            message,
            "exporting_video failed: FFmpeg command failed: encoder exited"
        );
    }

    #[test]
    fn test_stage_only_for_stage_failures() {
        let err: WorkerResult<()> =
            Err(MediaError::ffmpeg_failed("no decoder", None, Some(1)))
                .in_stage(JobStage::LoadingVideo);
        assert_eq!(err.unwrap_err().stage(), Some(JobStage::LoadingVideo));
        assert_eq!(WorkerError::config_error("bad env").stage(), None);
    }
}
