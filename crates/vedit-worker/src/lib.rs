//! Scene editing worker.
//!
//! Pulls queued jobs from the job store and runs the analysis and rendering
//! pipeline for each, one job at a time.

pub mod config;
pub mod error;
pub mod executor;
pub mod intake;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;

pub use config::{StoreBackend, WorkerConfig};
pub use error::{StageResultExt, WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use intake::submit;
pub use logging::JobLogger;
pub use pipeline::Pipeline;
pub use progress::ProgressReporter;
