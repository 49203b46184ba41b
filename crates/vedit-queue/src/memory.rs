//! In-process job store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use vedit_models::{JobId, JobKind, JobRecord};

use crate::error::{QueueError, QueueResult};
use crate::store::{is_expired, JobStore, RecordMutation};

struct Entry {
    record: JobRecord,
    expires_at: Instant,
}

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, Entry>,
    queue: VecDeque<JobId>,
}

impl State {
    fn live(&mut self, id: &JobId) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.jobs.get(id).is_some_and(|e| e.expires_at <= now) {
            self.jobs.remove(id);
        }
        self.jobs.get_mut(id)
    }
}

/// Job store backed by a mutex-guarded map. Records expire `ttl` after their
/// last write, matching the Redis store's behaviour.
pub struct MemoryJobStore {
    state: Mutex<State>,
    ttl: Duration,
}

impl MemoryJobStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            ttl,
        }
    }

    /// Queued ids not yet dequeued.
    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, source_path: &Path, kind: JobKind) -> QueueResult<JobId> {
        let record = JobRecord::new(JobId::new(), source_path, kind);
        let id = record.id.clone();

        let mut state = self.state.lock().await;
        state.jobs.insert(
            id.clone(),
            Entry {
                record,
                expires_at: Instant::now() + self.ttl,
            },
        );
        state.queue.push_back(id.clone());

        info!(job_id = %id, "Created job");
        Ok(id)
    }

    async fn get(&self, id: &JobId) -> QueueResult<Option<JobRecord>> {
        let mut state = self.state.lock().await;
        Ok(state.live(id).map(|e| e.record.clone()))
    }

    async fn update(&self, id: &JobId, mutate: RecordMutation<'_>) -> QueueResult<JobRecord> {
        let mut state = self.state.lock().await;
        let entry = state
            .live(id)
            .ok_or_else(|| QueueError::JobNotFound(id.clone()))?;

        // Mutate a copy so a rejected change leaves the stored record intact.
        let mut record = entry.record.clone();
        mutate(&mut record)?;
        entry.record = record.clone();
        entry.expires_at = Instant::now() + self.ttl;
        Ok(record)
    }

    async fn dequeue(&self) -> QueueResult<Option<JobId>> {
        let mut state = self.state.lock().await;
        while let Some(id) = state.queue.pop_front() {
            if state.live(&id).is_some() {
                return Ok(Some(id));
            }
            debug!(job_id = %id, "Skipping expired queued job");
        }
        Ok(None)
    }

    async fn list_active(&self) -> QueueResult<Vec<JobRecord>> {
        let now = Instant::now();
        let state = self.state.lock().await;
        let mut active: Vec<JobRecord> = state
            .jobs
            .values()
            .filter(|e| e.expires_at > now && !e.record.is_terminal())
            .map(|e| e.record.clone())
            .collect();
        active.sort_by_key(|job| job.created_at);
        Ok(active)
    }

    async fn expire(&self, max_age: Duration) -> QueueResult<usize> {
        let now = Instant::now();
        let wall = Utc::now();
        let mut state = self.state.lock().await;
        let before = state.jobs.len();
        state
            .jobs
            .retain(|_, e| e.expires_at > now && !is_expired(&e.record, max_age, wall));
        Ok(before - state.jobs.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use vedit_models::{
        AnalyzeOptions, JobResult, JobStage, JobStatus, ModelError, ProcessOptions,
    };

    fn process() -> JobKind {
        JobKind::Process(ProcessOptions::default())
    }

    #[tokio::test]
    async fn test_create_and_dequeue_fifo() {
        let store = MemoryJobStore::default();
        let a = store.create(Path::new("/a.mp4"), process()).await.unwrap();
        let b = store
            .create(Path::new("/b.mp4"), JobKind::Analyze(AnalyzeOptions::default()))
            .await
            .unwrap();

        let job = store.get(&a).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);

        assert_eq!(store.dequeue().await.unwrap(), Some(a));
        assert_eq!(store.dequeue().await.unwrap(), Some(b));
        assert_eq!(store.dequeue().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lifecycle_through_store() {
        let store = MemoryJobStore::default();
        let id = store.create(Path::new("/a.mp4"), process()).await.unwrap();

        store.start(&id).await.unwrap();
        store
            .update_progress(
                &id,
                10,
                JobStage::LoadingVideo,
                Some(serde_json::json!({"path": "/a.mp4"})),
            )
            .await
            .unwrap();
        assert_eq!(store.list_active().await.unwrap().len(), 1);

        store
            .complete(
                &id,
                JobResult {
                    message: "done".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.result.unwrap().message, "done");
        assert!(store.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_one_claim_succeeds() {
        let store = MemoryJobStore::default();
        let id = store.create(Path::new("/a.mp4"), process()).await.unwrap();

        assert_ok!(store.start(&id).await);
        let second = store.start(&id).await;
        assert!(matches!(
            second,
            Err(QueueError::Rejected(ModelError::InvalidTransition { .. }))
        ));
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_record_unchanged() {
        let store = MemoryJobStore::default();
        let id = store.create(Path::new("/a.mp4"), process()).await.unwrap();
        store.start(&id).await.unwrap();
        store
            .update_progress(&id, 30, JobStage::DetectingScenes, None)
            .await
            .unwrap();

        let regress = store
            .update_progress(&id, 10, JobStage::LoadingVideo, None)
            .await;
        assert_err!(regress);

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.progress, 30);
        assert_eq!(job.current_stage, JobStage::DetectingScenes);
    }

    #[tokio::test]
    async fn test_failed_job_is_terminal() {
        let store = MemoryJobStore::default();
        let id = store.create(Path::new("/a.mp4"), process()).await.unwrap();
        store.start(&id).await.unwrap();
        store.fail(&id, "export failed").await.unwrap();

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("export failed"));
        assert_err!(store.start(&id).await);
        assert_err!(store.complete(&id, JobResult::default()).await);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let store = MemoryJobStore::default();
        let missing = JobId::from_string("missing");
        assert!(store.get(&missing).await.unwrap().is_none());
        assert!(matches!(
            store.fail(&missing, "x").await,
            Err(QueueError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_records_expire_after_ttl() {
        let store = MemoryJobStore::new(Duration::from_millis(20));
        let id = store.create(Path::new("/a.mp4"), process()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.get(&id).await.unwrap().is_none());
        assert_eq!(store.dequeue().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expire_removes_finished_jobs() {
        let store = MemoryJobStore::default();
        let done = store.create(Path::new("/a.mp4"), process()).await.unwrap();
        let pending = store.create(Path::new("/b.mp4"), process()).await.unwrap();
        store.start(&done).await.unwrap();
        store.fail(&done, "boom").await.unwrap();

        // Nothing is older than a day yet.
        assert_eq!(store.expire(Duration::from_secs(86_400)).await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.expire(Duration::from_millis(5)).await.unwrap(), 1);
        assert!(store.get(&done).await.unwrap().is_none());
        assert!(store.get(&pending).await.unwrap().is_some());
    }
}
