//! The job store interface.
//!
//! A store holds whole job records with a bounded lifetime and a FIFO queue
//! of job ids. Every mutation is a read-modify-write of the full record that
//! either applies atomically or not at all; the record's own lifecycle rules
//! decide whether a mutation is legal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

use vedit_models::{JobId, JobKind, JobRecord, JobResult, JobStage, ModelResult};

use crate::error::QueueResult;

/// Mutation applied to a job record. May run more than once under contention.
pub type RecordMutation<'a> = &'a (dyn Fn(&mut JobRecord) -> ModelResult<()> + Send + Sync);

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new pending job and queue it.
    async fn create(&self, source_path: &Path, kind: JobKind) -> QueueResult<JobId>;

    async fn get(&self, id: &JobId) -> QueueResult<Option<JobRecord>>;

    /// Atomically apply `mutate` to the stored record and return the result.
    async fn update(&self, id: &JobId, mutate: RecordMutation<'_>) -> QueueResult<JobRecord>;

    /// Next queued job id, if any.
    async fn dequeue(&self) -> QueueResult<Option<JobId>>;

    /// Jobs that are pending or processing.
    async fn list_active(&self) -> QueueResult<Vec<JobRecord>>;

    /// Delete terminal jobs that finished more than `max_age` ago.
    /// Returns how many were removed.
    async fn expire(&self, max_age: Duration) -> QueueResult<usize>;

    /// Store name for logging.
    fn name(&self) -> &'static str;

    /// Move a job from `pending` to `processing`. Fails for any other state,
    /// so only one caller can ever claim a job.
    async fn start(&self, id: &JobId) -> QueueResult<JobRecord> {
        self.update(id, &|job| job.start()).await
    }

    async fn update_progress(
        &self,
        id: &JobId,
        progress: u8,
        stage: JobStage,
        details: Option<serde_json::Value>,
    ) -> QueueResult<()> {
        self.update(id, &|job| job.advance(progress, stage, details.clone()))
            .await
            .map(|_| ())
    }

    async fn complete(&self, id: &JobId, result: JobResult) -> QueueResult<()> {
        self.update(id, &|job| job.complete(result.clone()))
            .await
            .map(|_| ())
    }

    async fn fail(&self, id: &JobId, error: &str) -> QueueResult<()> {
        self.update(id, &|job| job.fail(error)).await.map(|_| ())
    }
}

/// Whether a record is past its retention window at `now`.
pub(crate) fn is_expired(job: &JobRecord, max_age: Duration, now: DateTime<Utc>) -> bool {
    if !job.is_terminal() {
        return false;
    }
    let finished = job.completed_at.unwrap_or(job.updated_at);
    match chrono::Duration::from_std(max_age) {
        Ok(max_age) => now.signed_duration_since(finished) > max_age,
        Err(_) => false,
    }
}
