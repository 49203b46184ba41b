//! In-memory video source that renders frames on demand.

use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;

use crate::error::MediaResult;
use crate::frame::{Frame, FrameReader, FrameSpan, Video};
use crate::probe::VideoInfo;

type FrameFn = Arc<dyn Fn(u64) -> RgbImage + Send + Sync>;

/// A video whose frames come from a function of the frame index.
///
/// Used for synthetic sources and for wrapping other sources in memory.
#[derive(Clone)]
pub struct MemoryVideo {
    info: VideoInfo,
    render: FrameFn,
}

impl MemoryVideo {
    pub fn new<F>(info: VideoInfo, render: F) -> Self
    where
        F: Fn(u64) -> RgbImage + Send + Sync + 'static,
    {
        Self {
            info,
            render: Arc::new(render),
        }
    }

    /// A video that shows a solid colour per frame.
    pub fn solid<F>(duration: f64, fps: f64, width: u32, height: u32, colour: F) -> Self
    where
        F: Fn(u64) -> [u8; 3] + Send + Sync + 'static,
    {
        let info = VideoInfo {
            duration,
            width,
            height,
            fps,
            codec: "rawvideo".to_string(),
            has_audio: false,
        };
        Self::new(info, move |index| {
            RgbImage::from_pixel(width, height, image::Rgb(colour(index)))
        })
    }
}

impl std::fmt::Debug for MemoryVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVideo").field("info", &self.info).finish()
    }
}

#[async_trait]
impl Video for MemoryVideo {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    async fn read(&self, span: FrameSpan) -> MediaResult<Box<dyn FrameReader>> {
        let (first, end) = span.frame_range(&self.info);
        Ok(Box::new(MemoryFrameReader {
            render: Arc::clone(&self.render),
            fps: self.info.fps,
            next_index: first,
            end_index: end,
            stride: span.stride.max(1) as u64,
        }))
    }
}

struct MemoryFrameReader {
    render: FrameFn,
    fps: f64,
    next_index: u64,
    end_index: u64,
    stride: u64,
}

#[async_trait]
impl FrameReader for MemoryFrameReader {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.next_index >= self.end_index {
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += self.stride;
        Ok(Some(Frame::new(index, self.fps, (self.render)(index))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::collect_frames;

    #[tokio::test]
    async fn test_strided_read_is_restartable() {
        let video = MemoryVideo::solid(3.0, 10.0, 2, 2, |i| [i as u8, 0, 0]);
        let span = FrameSpan::full(video.info()).with_stride(10);

        let mut reader = video.read(span).await.unwrap();
        let first_pass = collect_frames(&mut *reader).await.unwrap();
        let indices: Vec<u64> = first_pass.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 10, 20]);
        assert_eq!(first_pass[1].image.get_pixel(0, 0).0, [10, 0, 0]);

        let mut again = video.read(span).await.unwrap();
        assert_eq!(collect_frames(&mut *again).await.unwrap().len(), 3);
    }
}
