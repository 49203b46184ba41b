//! Job intake.

use std::path::Path;
use tracing::info;

use vedit_media::VideoLoader;
use vedit_models::{JobId, JobKind};
use vedit_queue::JobStore;

use crate::error::WorkerResult;

/// Validate `kind`, check that `source` opens as a video, then create and
/// queue the job. Nothing is written to the store when either check fails.
pub async fn submit(
    store: &dyn JobStore,
    loader: &dyn VideoLoader,
    source: &Path,
    kind: JobKind,
) -> WorkerResult<JobId> {
    kind.validate()?;

    let video = loader.open(source).await?;
    let duration = video.info().duration;
    drop(video);

    let job_id = store.create(source, kind).await?;
    info!(
        job_id = %job_id,
        source = %source.display(),
        duration,
        "Submitted job"
    );
    Ok(job_id)
}
