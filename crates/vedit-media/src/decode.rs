//! FFmpeg-backed video source.
//!
//! Frames are decoded to rgb24 and streamed over stdout one fixed-size frame
//! at a time. Dropping a reader kills its FFmpeg process.

use async_trait::async_trait;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};

use crate::command::check_ffmpeg;
use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, FrameReader, FrameSpan, Video, VideoLoader};
use crate::probe::{probe_video, VideoInfo};

/// Opens files through ffprobe and decodes them with ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegVideoLoader;

#[async_trait]
impl VideoLoader for FfmpegVideoLoader {
    async fn open(&self, path: &Path) -> MediaResult<Arc<dyn Video>> {
        check_ffmpeg()?;
        let info = probe_video(path).await?;
        info!(
            path = %path.display(),
            duration = info.duration,
            fps = info.fps,
            width = info.width,
            height = info.height,
            has_audio = info.has_audio,
            "Opened video"
        );
        Ok(Arc::new(FfmpegVideo {
            path: path.to_path_buf(),
            info,
        }))
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// A probed video file.
#[derive(Debug, Clone)]
pub struct FfmpegVideo {
    path: PathBuf,
    info: VideoInfo,
}

impl FfmpegVideo {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Arguments for decoding `span` to rgb24 on stdout.
pub fn decode_args(path: &Path, span: &FrameSpan) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        format!("{:.3}", span.start),
        "-t".to_string(),
        format!("{:.3}", span.duration()),
        "-i".to_string(),
        path.to_string_lossy().to_string(),
    ];
    if span.stride > 1 {
        args.extend([
            "-vf".to_string(),
            format!("select=not(mod(n\\,{}))", span.stride),
            "-vsync".to_string(),
            "vfr".to_string(),
        ]);
    }
    args.extend([
        "-an".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-".to_string(),
    ]);
    args
}

#[async_trait]
impl Video for FfmpegVideo {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    async fn read(&self, span: FrameSpan) -> MediaResult<Box<dyn FrameReader>> {
        let (first, end) = span.frame_range(&self.info);
        let args = decode_args(&self.path, &span);
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None)
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None)
        })?;

        Ok(Box::new(FfmpegFrameReader {
            child,
            stdout: BufReader::new(stdout),
            width: self.info.width,
            height: self.info.height,
            fps: self.info.fps,
            next_index: first,
            end_index: end,
            stride: span.stride.max(1) as u64,
            done: false,
        }))
    }
}

struct FfmpegFrameReader {
    child: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    fps: f64,
    next_index: u64,
    end_index: u64,
    stride: u64,
    done: bool,
}

impl FfmpegFrameReader {
    async fn finish(&mut self) -> MediaResult<()> {
        self.done = true;
        let status = self.child.wait().await?;
        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg frame decode exited with non-zero status",
                None,
                status.code(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl FrameReader for FfmpegFrameReader {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.done {
            return Ok(None);
        }
        if self.next_index >= self.end_index {
            // Leave the rest to kill_on_drop; the decoder may still be writing.
            self.done = true;
            return Ok(None);
        }

        let mut buf = vec![0u8; self.width as usize * self.height as usize * 3];
        match self.stdout.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finish().await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let image = RgbImage::from_raw(self.width, self.height, buf)
            .ok_or_else(|| MediaError::internal("Decoded frame has unexpected size"))?;
        let frame = Frame::new(self.next_index, self.fps, image);
        self.next_index += self.stride;
        Ok(Some(frame))
    }
}
