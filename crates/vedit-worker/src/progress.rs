//! Stage checkpoints for a running job.

use std::sync::Arc;
use std::time::Instant;

use vedit_models::{JobId, JobStage};
use vedit_queue::JobStore;

use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;

/// Writes stage transitions of one job to the store, in order.
///
/// The job is already at `processing(0)` when a reporter is created.
pub struct ProgressReporter {
    store: Arc<dyn JobStore>,
    job_id: JobId,
    logger: JobLogger,
    current: Option<(JobStage, Instant)>,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn JobStore>, job_id: JobId, logger: JobLogger) -> Self {
        Self {
            store,
            job_id,
            logger,
            current: Some((JobStage::Processing, Instant::now())),
        }
    }

    pub fn logger(&self) -> &JobLogger {
        &self.logger
    }

    /// Record the start of `stage` at its fixed progress checkpoint.
    pub async fn enter(&mut self, stage: JobStage, details: Option<serde_json::Value>) -> WorkerResult<()> {
        self.store
            .update_progress(&self.job_id, stage.progress(), stage, details)
            .await?;
        self.close_stage();
        self.current = Some((stage, Instant::now()));
        self.logger.stage_entered(stage);
        Ok(())
    }

    /// Close the open stage. Called once the job reaches a terminal state.
    pub fn finish(&mut self) {
        self.close_stage();
    }

    pub fn current_stage(&self) -> Option<JobStage> {
        self.current.map(|(stage, _)| stage)
    }

    fn close_stage(&mut self) {
        if let Some((stage, started)) = self.current.take() {
            let elapsed = started.elapsed().as_secs_f64();
            self.logger.stage_closed(stage, elapsed);
            metrics::record_stage(stage, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tokio_test::assert_ok;
    use vedit_models::{JobKind, ProcessOptions};
    use vedit_queue::MemoryJobStore;

    #[tokio::test]
    async fn test_enter_writes_checkpoint() {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::default());
        let id = store
            .create(Path::new("/in.mp4"), JobKind::Process(ProcessOptions::default()))
            .await
            .unwrap();
        let started = store.start(&id).await.unwrap();

        let mut reporter =
            ProgressReporter::new(Arc::clone(&store), id.clone(), JobLogger::for_job(&started));
        assert_ok!(
            reporter
                .enter(JobStage::LoadingVideo, Some(serde_json::json!({"source": "/in.mp4"})))
                .await
        );

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.progress, 10);
        assert_eq!(job.current_stage, JobStage::LoadingVideo);
        assert_eq!(job.details.unwrap()["source"], "/in.mp4");
        assert_eq!(reporter.current_stage(), Some(JobStage::LoadingVideo));

        reporter.finish();
        assert_eq!(reporter.current_stage(), None);
    }
}
