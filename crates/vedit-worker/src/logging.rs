//! Job lifecycle events.
//!
//! Every event carries the job id and kind. Stage events add the stage name
//! and its progress checkpoint so a log stream reads like the job's trace.

use std::path::Path;

use tracing::{debug, error, info, warn, Span};

use vedit_models::{JobId, JobRecord, JobResult, JobStage};

use crate::error::WorkerError;

#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    kind: &'static str,
}

impl JobLogger {
    pub fn for_job(job: &JobRecord) -> Self {
        Self {
            job_id: job.id.clone(),
            kind: job.kind.as_str(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Span wrapping one run of the job.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, kind = self.kind)
    }

    pub fn started(&self, source: &Path) {
        info!(
            job_id = %self.job_id,
            kind = self.kind,
            source = %source.display(),
            "Job started"
        );
    }

    pub fn stage_entered(&self, stage: JobStage) {
        info!(
            job_id = %self.job_id,
            kind = self.kind,
            stage = stage.as_str(),
            progress = stage.progress(),
            "Entered stage"
        );
    }

    pub fn stage_closed(&self, stage: JobStage, elapsed_secs: f64) {
        debug!(
            job_id = %self.job_id,
            stage = stage.as_str(),
            elapsed_secs,
            "Stage finished"
        );
    }

    pub fn scenes_detected(&self, count: usize) {
        info!(job_id = %self.job_id, kind = self.kind, scenes = count, "Detected scenes");
    }

    /// Selection dropped every scene; the whole source gets rendered.
    pub fn nothing_selected(&self) {
        warn!(
            job_id = %self.job_id,
            kind = self.kind,
            "No scenes selected, exporting the full video"
        );
    }

    pub fn completed(&self, result: &JobResult, elapsed_secs: f64) {
        info!(
            job_id = %self.job_id,
            kind = self.kind,
            scenes = result.scenes.len(),
            keyframes = result.keyframes.len(),
            output = ?result.output_path,
            elapsed_secs,
            "Job completed"
        );
    }

    pub fn failed(&self, err: &WorkerError, elapsed_secs: f64) {
        error!(
            job_id = %self.job_id,
            kind = self.kind,
            stage = err.stage().map(|s| s.as_str()),
            error = %err,
            elapsed_secs,
            "Job failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vedit_models::{AnalyzeOptions, JobKind};

    #[test]
    fn test_logger_carries_job_identity() {
        let job = JobRecord::new(
            JobId::new(),
            PathBuf::from("/in.mp4"),
            JobKind::Analyze(AnalyzeOptions::default()),
        );
        let logger = JobLogger::for_job(&job);

        assert_eq!(logger.job_id(), &job.id);
        assert_eq!(logger.kind(), "analyze");
    }
}
