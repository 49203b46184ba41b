//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Progress reported on FFmpeg's `-progress` channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    pub out_time_ms: i64,
    pub frame: u64,
    pub fps: f64,
    pub speed: f64,
    pub is_complete: bool,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Primary input, `-` for stdin
    input: PathBuf,
    /// Further inputs, in `-i` order after the primary one
    extra_inputs: Vec<PathBuf>,
    output: PathBuf,
    /// Arguments before the primary `-i`
    input_args: Vec<String>,
    /// Arguments after the last `-i`
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            extra_inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Read raw rgb24 frames of the given geometry from stdin.
    pub fn raw_rgb_input(output: impl AsRef<Path>, width: u32, height: u32, fps: f64) -> Self {
        Self::new("-", output).input_args([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            format_rate(fps),
        ])
    }

    pub fn add_input(mut self, input: impl AsRef<Path>) -> Self {
        self.extra_inputs.push(input.as_ref().to_path_buf());
        self
    }

    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Set duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    /// Drop the video stream.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        args.extend(self.input_args.clone());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        for input in &self.extra_inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
        }

        args.extend(self.output_args.clone());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

fn format_rate(fps: f64) -> String {
    if (fps - fps.round()).abs() < 1e-9 {
        format!("{}", fps.round() as u64)
    } else {
        format!("{:.6}", fps)
    }
}

/// Runner for FFmpeg commands with progress tracking and a timeout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run an FFmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let process = self.spawn(cmd, Stdio::null(), progress_callback)?;
        process.finish().await
    }

    /// Start an FFmpeg command that reads its primary input from stdin.
    pub fn spawn_piped(&self, cmd: &FfmpegCommand) -> MediaResult<FfmpegProcess> {
        self.spawn(cmd, Stdio::piped(), |_| {})
    }

    fn spawn<F>(&self, cmd: &FfmpegCommand, stdin: Stdio, progress_callback: F) -> MediaResult<FfmpegProcess>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;
        let stderr_task = tokio::spawn(drain_stderr(stderr, progress_callback));

        Ok(FfmpegProcess {
            child,
            stdin,
            stderr_task,
            timeout: self.timeout,
        })
    }
}

/// Read FFmpeg's stderr, forwarding progress blocks and keeping other lines.
async fn drain_stderr<F>(stderr: ChildStderr, progress_callback: F) -> String
where
    F: Fn(FfmpegProgress) + Send + 'static,
{
    let mut reader = BufReader::new(stderr).lines();
    let mut current = FfmpegProgress::default();
    let mut messages = String::new();

    while let Ok(Some(line)) = reader.next_line().await {
        if is_progress_line(&line) {
            if let Some(progress) = parse_progress_line(&line, &mut current) {
                progress_callback(progress);
            }
        } else if !line.trim().is_empty() {
            messages.push_str(line.trim());
            messages.push('\n');
        }
    }
    messages
}

/// A running FFmpeg process.
pub struct FfmpegProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: JoinHandle<String>,
    timeout: Option<Duration>,
}

impl FfmpegProcess {
    /// Write raw bytes to FFmpeg's stdin.
    pub async fn write(&mut self, bytes: &[u8]) -> MediaResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::internal("FFmpeg stdin is not piped"))?;
        stdin.write_all(bytes).await?;
        Ok(())
    }

    /// Close stdin and wait for FFmpeg to exit.
    pub async fn finish(mut self) -> MediaResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.shutdown().await?;
        }

        let status = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(
                        "FFmpeg timed out after {} seconds, killing process",
                        timeout.as_secs()
                    );
                    let _ = self.child.kill().await;
                    return Err(MediaError::Timeout(timeout.as_secs()));
                }
            },
            None => self.child.wait().await?,
        };

        let stderr = self.stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                (!stderr.is_empty()).then_some(stderr),
                status.code(),
            ))
        }
    }
}

fn is_progress_line(line: &str) -> bool {
    matches!(
        line.trim().split_once('='),
        Some((key, _)) if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    )
}

/// Parse a progress line from FFmpeg's -progress output.
///
/// Returns a snapshot at the end of each progress block.
fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_ms" | "out_time_us" => {
            // FFmpeg reports microseconds under both keys
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }
    None
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.m4a")
            .seek(10.0)
            .duration(30.0)
            .no_video()
            .audio_codec("aac");

        let args = cmd.build_args();
        let input = args.iter().position(|a| a == "input.mp4").unwrap();
        let seek = args.iter().position(|a| a == "-ss").unwrap();
        assert!(seek < input);
        assert_eq!(args[seek + 1], "10.000");
        assert!(args.contains(&"-vn".to_string()));
        assert_eq!(args.last().unwrap(), "output.m4a");
    }

    #[test]
    fn test_raw_input_and_extra_inputs() {
        let args = FfmpegCommand::raw_rgb_input("out.mp4", 640, 360, 29.97)
            .add_input("audio.m4a")
            .map("0:v")
            .map("1:a")
            .build_args();

        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgb24 -s 640x360 -r 29.970000 -i - -i audio.m4a"));
        assert!(joined.ends_with("-map 0:v -map 1:a out.mp4"));

        let integral = FfmpegCommand::raw_rgb_input("out.mp4", 2, 2, 25.0).build_args();
        assert!(integral.join(" ").contains("-r 25 -i -"));
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        assert!(parse_progress_line("out_time_us=5000000", &mut progress).is_none());
        assert_eq!(progress.out_time_ms, 5000);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);
        parse_progress_line("speed=N/A", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        let result = parse_progress_line("progress=end", &mut progress);
        assert!(result.is_some());
        assert!(progress.is_complete);
    }

    #[test]
    fn test_progress_lines_are_told_apart_from_errors() {
        assert!(is_progress_line("frame=12"));
        assert!(is_progress_line("out_time_us=1000"));
        assert!(!is_progress_line("Error opening input file in.mp4."));
        assert!(!is_progress_line("[libx264 @ 0x1] crf=20 invalid"));
    }
}
