//! Job executor.
//!
//! Pulls one job at a time from the store and runs it to completion or
//! failure before polling again. Stage errors end the job, never the loop.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

use vedit_models::{JobId, JobRecord, JobStatus};
use vedit_queue::{JobStore, QueueError};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::Pipeline;
use crate::progress::ProgressReporter;

/// Job executor that processes jobs from the store.
pub struct JobExecutor {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    pipeline: Arc<Pipeline>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, store: Arc<dyn JobStore>, pipeline: Arc<Pipeline>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            store,
            pipeline,
            shutdown,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Poll until shutdown is signalled. A running job is never interrupted;
    /// shutdown takes effect between jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            store = self.store.name(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting job executor"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut last_sweep: Option<Instant> = None;

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping executor");
                break;
            }

            if last_sweep.map_or(true, |t| t.elapsed() >= self.config.expire_interval) {
                self.sweep_expired().await;
                last_sweep = Some(Instant::now());
            }

            let wait = match self.poll_once().await {
                Ok(true) => continue,
                Ok(false) => self.config.poll_interval,
                Err(e) => {
                    error!(error = %e, "Job store error, backing off");
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }

        Ok(())
    }

    /// Dequeue and run at most one job. Returns whether a job id was taken.
    pub async fn poll_once(&self) -> WorkerResult<bool> {
        let Some(job_id) = self.store.dequeue().await? else {
            return Ok(false);
        };
        self.execute_job(&job_id).await?;
        Ok(true)
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn execute_job(&self, job_id: &JobId) -> WorkerResult<()> {
        let job = match self.store.start(job_id).await {
            Ok(job) => job,
            Err(QueueError::JobNotFound(_)) => {
                warn!(job_id = %job_id, "Queued job no longer exists, skipping");
                return Ok(());
            }
            Err(QueueError::Rejected(e)) => {
                warn!(job_id = %job_id, error = %e, "Queued job cannot be claimed, skipping");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let logger = JobLogger::for_job(&job);
        let span = logger.span();
        self.run_job(job, logger).instrument(span).await
    }

    async fn run_job(&self, job: JobRecord, logger: JobLogger) -> WorkerResult<()> {
        let started = Instant::now();
        logger.started(&job.source_path);

        let mut progress = ProgressReporter::new(Arc::clone(&self.store), job.id.clone(), logger.clone());
        let outcome = self.pipeline.run(&job, &mut progress).await;
        progress.finish();

        let status = match outcome {
            Ok(result) => {
                logger.completed(&result, started.elapsed().as_secs_f64());
                self.store.complete(&job.id, result).await?;
                JobStatus::Completed
            }
            Err(e) => {
                logger.failed(&e, started.elapsed().as_secs_f64());
                self.store.fail(&job.id, &e.to_string()).await?;
                JobStatus::Failed
            }
        };

        metrics::record_job(job.kind.as_str(), status.as_str(), started.elapsed().as_secs_f64());
        Ok(())
    }

    async fn sweep_expired(&self) {
        match self.store.expire(self.config.retention).await {
            Ok(0) => debug!("No finished jobs to expire"),
            Ok(removed) => {
                info!(removed, "Expired finished jobs");
                metrics::record_expired(removed);
            }
            Err(e) => warn!(error = %e, "Expiry sweep failed"),
        }
    }
}
