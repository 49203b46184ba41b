//! Frames, frame spans and the video source traits.
//!
//! A [`Video`] is an opened source. Reading a [`FrameSpan`] yields a lazy,
//! finite [`FrameReader`]; opening another reader restarts decoding, so a
//! span can be walked as many times as needed without holding frames in
//! memory.

use async_trait::async_trait;
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;

use vedit_models::Scene;

use crate::error::MediaResult;
use crate::probe::VideoInfo;

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Absolute frame index in the source
    pub index: u64,
    /// Presentation time in seconds
    pub timestamp: f64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, fps: f64, image: RgbImage) -> Self {
        Self {
            index,
            timestamp: index as f64 / fps,
            image,
        }
    }
}

/// A time range and the stride at which to take frames from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSpan {
    pub start: f64,
    pub end: f64,
    /// Take every `stride`-th frame, starting with the first one in range
    pub stride: usize,
}

impl FrameSpan {
    /// Every frame of the whole video.
    pub fn full(info: &VideoInfo) -> Self {
        Self {
            start: 0.0,
            end: info.duration,
            stride: 1,
        }
    }

    /// Every frame of a scene.
    pub fn scene(scene: &Scene) -> Self {
        Self {
            start: scene.start_time,
            end: scene.end_time,
            stride: 1,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride.max(1);
        self
    }

    /// Half-open range of frame indices `[first, end)` this span covers.
    pub fn frame_range(&self, info: &VideoInfo) -> (u64, u64) {
        let total = info.frame_count();
        let first = index_at(self.start, info.fps).min(total);
        let end = index_at(self.end, info.fps).min(total);
        (first, end.max(first))
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// First frame index at or after `t`.
fn index_at(t: f64, fps: f64) -> u64 {
    (t * fps - 1e-6).ceil().max(0.0) as u64
}

/// Pull-based frame sequence.
#[async_trait]
pub trait FrameReader: Send {
    /// Next frame, or `None` once the span is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>>;
}

/// An opened video source.
#[async_trait]
pub trait Video: Send + Sync {
    fn info(&self) -> &VideoInfo;

    /// Start a fresh pass over `span`.
    async fn read(&self, span: FrameSpan) -> MediaResult<Box<dyn FrameReader>>;
}

/// Opens video sources.
#[async_trait]
pub trait VideoLoader: Send + Sync {
    async fn open(&self, path: &Path) -> MediaResult<Arc<dyn Video>>;

    /// Loader name for logging.
    fn name(&self) -> &'static str;
}

/// Drain a reader into a vector. Only for spans known to be small.
pub async fn collect_frames(reader: &mut dyn FrameReader) -> MediaResult<Vec<Frame>> {
    let mut frames = Vec::new();
    while let Some(frame) = reader.next_frame().await? {
        frames.push(frame);
    }
    Ok(frames)
}
