//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which job store the worker talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(format!("unknown store backend `{}`", other)),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between polls of an empty queue
    pub poll_interval: Duration,
    /// Sleep after a store error before polling again
    pub error_backoff: Duration,
    /// Directory for rendered output; `None` writes next to the source
    pub output_dir: Option<PathBuf>,
    /// Finished jobs older than this are removed by the expiry sweep
    pub retention: Duration,
    /// How often the expiry sweep runs
    pub expire_interval: Duration,
    pub store_backend: StoreBackend,
    /// Prometheus listener; metrics are not exported when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
            output_dir: None,
            retention: Duration::from_secs(24 * 3600),
            expire_interval: Duration::from_secs(600),
            store_backend: StoreBackend::Redis,
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_millis(
                std::env::var("WORKER_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            error_backoff: Duration::from_secs(
                std::env::var("WORKER_ERROR_BACKOFF_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            output_dir: std::env::var("VEDIT_OUTPUT_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            retention: Duration::from_secs(
                std::env::var("VEDIT_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(24 * 3600),
            ),
            expire_interval: Duration::from_secs(
                std::env::var("VEDIT_EXPIRE_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            store_backend: std::env::var("VEDIT_STORE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(StoreBackend::Redis),
            metrics_addr: std::env::var("METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}
