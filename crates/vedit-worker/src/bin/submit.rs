//! Queue a video for the worker.
//!
//! Usage: `vedit-submit <video> [process|analyze] [options-json]`

use std::path::PathBuf;

use vedit_media::FfmpegVideoLoader;
use vedit_models::{AnalyzeOptions, JobKind, ProcessOptions};
use vedit_queue::RedisJobStore;
use vedit_worker::submit;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let source = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: vedit-submit <video> [process|analyze] [options-json]"))?;
    let mode = args.next().unwrap_or_else(|| "process".to_string());
    let options = args.next().unwrap_or_else(|| "{}".to_string());

    let kind = match mode.as_str() {
        "process" => JobKind::Process(serde_json::from_str::<ProcessOptions>(&options)?),
        "analyze" => JobKind::Analyze(serde_json::from_str::<AnalyzeOptions>(&options)?),
        other => return Err(anyhow::anyhow!("unknown job kind {}", other)),
    };

    let store = RedisJobStore::from_env()?;
    let job_id = submit(&store, &FfmpegVideoLoader, &source, kind).await?;

    println!("{}", job_id);
    Ok(())
}
