//! Scene editing worker binary.
//!
//! Usage: `vedit-worker [video ...]`. Paths given on the command line are
//! submitted as process jobs with default options before polling starts.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vedit_media::{
    AnalysisConfig, AssemblyConfig, EmptyDetector, FfmpegRenderer, FfmpegVideoLoader,
    HistogramEmbedder, ModelConfig, PresetStylizer, SceneAnalyzer, VisionModels,
};
use vedit_models::{JobKind, ProcessOptions};
use vedit_queue::{JobStore, MemoryJobStore, QueueConfig, RedisJobStore};
use vedit_worker::{submit, JobExecutor, Pipeline, StoreBackend, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;
    info!("Starting vedit-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        vedit_worker::metrics::init_metrics(addr)?;
        info!(%addr, "Serving Prometheus metrics");
    }

    let queue_config = QueueConfig::from_env();
    let store: Arc<dyn JobStore> = match config.store_backend {
        StoreBackend::Memory => Arc::new(MemoryJobStore::new(queue_config.job_ttl)),
        StoreBackend::Redis => Arc::new(RedisJobStore::new(queue_config)?),
    };

    let loader = Arc::new(FfmpegVideoLoader);
    let models = VisionModels::new(
        Arc::new(HistogramEmbedder::default()),
        Arc::new(EmptyDetector),
        Arc::new(PresetStylizer),
        ModelConfig::from_env(),
    );
    let assembly = AssemblyConfig::from_env();
    let pipeline = Pipeline::new(
        loader.clone(),
        SceneAnalyzer::new(AnalysisConfig::from_env(), models),
        Arc::new(FfmpegRenderer::new(assembly.clone())),
        assembly,
    )
    .with_output_dir(config.output_dir.clone());

    for path in std::env::args().skip(1).map(PathBuf::from) {
        let kind = JobKind::Process(ProcessOptions::default());
        match submit(store.as_ref(), loader.as_ref(), &path, kind).await {
            Ok(job_id) => info!(job_id = %job_id, path = %path.display(), "Queued video"),
            Err(e) => error!(path = %path.display(), error = %e, "Rejected video"),
        }
    }

    let executor = Arc::new(JobExecutor::new(config, store, Arc::new(pipeline)));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    executor.run().await?;

    info!("Worker shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vedit=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}
