//! Prometheus metrics for the worker.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use vedit_models::JobStage;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "vedit_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "vedit_job_duration_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "vedit_stage_duration_seconds";
    pub const JOBS_EXPIRED_TOTAL: &str = "vedit_jobs_expired_total";
}

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

/// Record a finished job.
pub fn record_job(kind: &str, status: &str, duration_secs: f64) {
    let labels = [("kind", kind.to_string()), ("status", status.to_string())];
    counter!(names::JOBS_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record how long a pipeline stage ran.
pub fn record_stage(stage: JobStage, duration_secs: f64) {
    let labels = [("stage", stage.as_str().to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_expired(count: usize) {
    counter!(names::JOBS_EXPIRED_TOTAL).increment(count as u64);
}
