//! Encoding an assembled timeline to a file.
//!
//! Frames are piped to an FFmpeg encoder as rgb24. When the source has audio,
//! the kept spans are trimmed and concatenated separately, then muxed with
//! the encoded video. Intermediates live in a scratch directory that is
//! removed when rendering ends, successfully or not.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use vedit_models::Scene;

use crate::assembler::Timeline;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::config::AssemblyConfig;
use crate::error::{MediaError, MediaResult};

/// Writes a timeline to an output file.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `timeline` (cut from `source`) to `output` and return the
    /// written path.
    async fn render(&self, timeline: &Timeline, source: &Path, output: &Path) -> MediaResult<PathBuf>;

    fn name(&self) -> &'static str;
}

/// FFmpeg-backed renderer.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRenderer {
    config: AssemblyConfig,
}

impl FfmpegRenderer {
    pub fn new(config: AssemblyConfig) -> Self {
        Self { config }
    }

    fn runner(&self) -> FfmpegRunner {
        FfmpegRunner::new().with_timeout(self.config.render_timeout)
    }

    async fn encode_video(&self, timeline: &Timeline, path: &Path) -> MediaResult<u64> {
        let info = timeline.info();
        let cmd = FfmpegCommand::raw_rgb_input(path, info.width, info.height, info.fps)
            .output_args(["-vf", "scale=trunc(iw/2)*2:trunc(ih/2)*2"])
            .video_codec(self.config.video_codec.clone())
            .preset(self.config.preset.clone())
            .crf(self.config.crf)
            .pixel_format("yuv420p");

        let mut encoder = self.runner().spawn_piped(&cmd)?;
        let mut frames = timeline.frames();
        let mut written = 0u64;

        while let Some(frame) = frames.next_frame().await? {
            if frame.image.width() != info.width || frame.image.height() != info.height {
                return Err(MediaError::internal(format!(
                    "frame {} is {}x{}, expected {}x{}",
                    frame.index,
                    frame.image.width(),
                    frame.image.height(),
                    info.width,
                    info.height
                )));
            }
            encoder.write(frame.image.as_raw()).await?;
            written += 1;
        }

        if written == 0 {
            return Err(MediaError::invalid_video("timeline produced no frames"));
        }

        encoder.finish().await?;
        Ok(written)
    }

    async fn extract_audio(&self, source: &Path, clips: &[Scene], path: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(source, path)
            .filter_complex(audio_filter(clips))
            .map("[aout]")
            .no_video()
            .audio_codec(self.config.audio_codec.clone());

        self.runner()
            .run_with_progress(&cmd, |p| {
                debug!(out_time_ms = p.out_time_ms, "Audio extraction progress");
            })
            .await
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(video, output)
            .add_input(audio)
            .map("0:v")
            .map("1:a")
            .video_codec("copy")
            .audio_codec("copy")
            .output_arg("-shortest");
        self.runner().run(&cmd).await
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(&self, timeline: &Timeline, source: &Path, output: &Path) -> MediaResult<PathBuf> {
        let started = Instant::now();
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let scratch = tempfile::Builder::new().prefix("vedit-render-").tempdir()?;
        let video_path = scratch.path().join("video.mp4");

        let frames = self.encode_video(timeline, &video_path).await?;

        if timeline.info().has_audio {
            let audio_path = scratch.path().join("audio.m4a");
            self.extract_audio(source, timeline.clips(), &audio_path).await?;
            self.mux(&video_path, &audio_path, output).await?;
        } else {
            tokio::fs::copy(&video_path, output).await?;
        }

        info!(
            output = %output.display(),
            clips = timeline.clips().len(),
            frames,
            duration = timeline.duration(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered video"
        );
        Ok(output.to_path_buf())
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// `filter_complex` that trims each clip's audio and concatenates the pieces
/// into `[aout]`.
pub fn audio_filter(clips: &[Scene]) -> String {
    let mut parts: Vec<String> = clips
        .iter()
        .enumerate()
        .map(|(i, clip)| {
            format!(
                "[0:a]atrim=start={:.3}:end={:.3},asetpts=PTS-STARTPTS[a{}]",
                clip.start_time, clip.end_time, i
            )
        })
        .collect();

    let labels: String = (0..clips.len()).map(|i| format!("[a{}]", i)).collect();
    parts.push(format!("{}concat=n={}:v=0:a=1[aout]", labels, clips.len()));
    parts.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_filter_single_clip() {
        let filter = audio_filter(&[Scene::new(1.0, 2.5).unwrap()]);
        assert_eq!(
            filter,
            "[0:a]atrim=start=1.000:end=2.500,asetpts=PTS-STARTPTS[a0];[a0]concat=n=1:v=0:a=1[aout]"
        );
    }

    #[test]
    fn test_audio_filter_concatenates_in_order() {
        let filter = audio_filter(&[
            Scene::new(0.0, 5.0).unwrap(),
            Scene::new(8.0, 9.0).unwrap(),
        ]);
        let parts: Vec<&str> = filter.split(';').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].ends_with("[a0]"));
        assert!(parts[1].starts_with("[0:a]atrim=start=8.000:end=9.000"));
        assert_eq!(parts[2], "[a0][a1]concat=n=2:v=0:a=1[aout]");
    }
}
