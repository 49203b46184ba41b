//! Fixed-stride frame sampling.

use crate::error::MediaResult;
use crate::frame::{FrameReader, FrameSpan, Video};
use crate::probe::VideoInfo;

/// Picks frames `0, s, 2s, ...` from a video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSampler {
    stride: usize,
    fps: f64,
}

impl FrameSampler {
    /// Use `stride` if given, otherwise one sample per second of video.
    pub fn for_video(info: &VideoInfo, stride: Option<usize>) -> Self {
        let stride = stride
            .filter(|s| *s > 0)
            .unwrap_or_else(|| (info.fps.round() as usize).max(1));
        Self {
            stride,
            fps: info.fps,
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn samples_per_second(&self) -> f64 {
        self.fps / self.stride as f64
    }

    /// Timestamp of the `n`-th sample.
    pub fn sample_time(&self, n: usize) -> f64 {
        n as f64 / self.samples_per_second()
    }

    /// A fresh lazy pass over the samples of the whole video.
    pub async fn samples(&self, video: &dyn Video) -> MediaResult<Box<dyn FrameReader>> {
        let span = FrameSpan::full(video.info()).with_stride(self.stride);
        video.read(span).await
    }
}
