//! Output assembly: colour grading, scene concatenation and transitions.
//!
//! Assembly is lazy. [`StyledVideo`] grades frames as they are read and a
//! [`Timeline`] walks its clips in order, so a renderer pulls one output
//! frame at a time.

use async_trait::async_trait;
use image::RgbImage;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

use vedit_models::{Scene, TransitionKind};

use crate::error::MediaResult;
use crate::frame::{Frame, FrameReader, FrameSpan, Video};
use crate::probe::VideoInfo;
use crate::vision::VisionModels;

/// A video whose frames pass through the style model on read.
pub struct StyledVideo {
    inner: Arc<dyn Video>,
    models: VisionModels,
    style: String,
    strength: f64,
}

impl StyledVideo {
    pub fn new(inner: Arc<dyn Video>, models: VisionModels, style: impl Into<String>, strength: f64) -> Self {
        Self {
            inner,
            models,
            style: style.into(),
            strength,
        }
    }
}

#[async_trait]
impl Video for StyledVideo {
    fn info(&self) -> &VideoInfo {
        self.inner.info()
    }

    async fn read(&self, span: FrameSpan) -> MediaResult<Box<dyn FrameReader>> {
        Ok(Box::new(StyledReader {
            inner: self.inner.read(span).await?,
            models: self.models.clone(),
            style: self.style.clone(),
            strength: self.strength,
        }))
    }
}

struct StyledReader {
    inner: Box<dyn FrameReader>,
    models: VisionModels,
    style: String,
    strength: f64,
}

#[async_trait]
impl FrameReader for StyledReader {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        let Some(frame) = self.inner.next_frame().await? else {
            return Ok(None);
        };
        let image = self
            .models
            .stylize(frame.image, &self.style, self.strength)
            .await?;
        Ok(Some(Frame { image, ..frame }))
    }
}

/// Brightness factor of a dip-to-black at `progress` through the transition:
/// down to black over the first half, back up over the second.
pub fn dip_to_black_factor(progress: f64) -> f64 {
    let p = progress.clamp(0.0, 1.0);
    if p < 0.5 {
        1.0 - p * 2.0
    } else {
        (p - 0.5) * 2.0
    }
}

/// Scale every channel of a frame by `factor`.
pub fn scale_brightness(mut image: RgbImage, factor: f64) -> RgbImage {
    if factor >= 1.0 {
        return image;
    }
    let factor = factor.max(0.0);
    image.par_chunks_mut(3).for_each(|px| {
        for c in px.iter_mut() {
            *c = (*c as f64 * factor) as u8;
        }
    });
    image
}

/// Kept clips of one source, in output order, with the join transition.
pub struct Timeline {
    source: Arc<dyn Video>,
    clips: Vec<Scene>,
    transition: TransitionKind,
    fade_duration: f64,
}

impl Timeline {
    /// An empty clip list means the whole source.
    pub fn new(source: Arc<dyn Video>, clips: Vec<Scene>, transition: TransitionKind, fade_duration: f64) -> Self {
        let clips = if clips.is_empty() {
            vec![Scene {
                start_time: 0.0,
                end_time: source.info().duration,
            }]
        } else {
            clips
        };

        let transition = match transition {
            TransitionKind::Other(name) => {
                warn!(transition = %name, "Unsupported transition, joining scenes with cuts");
                TransitionKind::Cut
            }
            known => known,
        };

        Self {
            source,
            clips,
            transition,
            fade_duration: fade_duration.max(0.0),
        }
    }

    pub fn info(&self) -> &VideoInfo {
        self.source.info()
    }

    pub fn clips(&self) -> &[Scene] {
        &self.clips
    }

    pub fn transition(&self) -> &TransitionKind {
        &self.transition
    }

    /// Output duration; transitions do not change it.
    pub fn duration(&self) -> f64 {
        self.clips.iter().map(Scene::duration).sum()
    }

    /// Total output frames.
    pub fn frame_count(&self) -> u64 {
        let info = self.info();
        self.clips
            .iter()
            .map(|clip| {
                let (first, end) = FrameSpan::scene(clip).frame_range(info);
                end - first
            })
            .sum()
    }

    /// Frames on each side of a join that take part in a fade.
    fn fade_frames(&self) -> u64 {
        if !self.transition.is_fade() {
            return 0;
        }
        (self.fade_duration / 2.0 * self.info().fps).round() as u64
    }

    /// Brightness factor for frame `position` of clip `clip`, `len` frames long.
    fn fade_factor(&self, clip: usize, position: u64, len: u64) -> f64 {
        let fade = self.fade_frames().min(len / 2);
        if fade == 0 {
            return 1.0;
        }
        let last_clip = self.clips.len() - 1;

        // 1-based distance from the clip's start and end
        let from_start = position + 1;
        let from_end = len - position;

        if clip > 0 && from_start <= fade {
            dip_to_black_factor(0.5 + 0.5 * (from_start - 1) as f64 / fade as f64)
        } else if clip < last_clip && from_end <= fade {
            dip_to_black_factor(0.5 * (fade - from_end + 1) as f64 / fade as f64)
        } else {
            1.0
        }
    }

    /// Start a pass over the output frames.
    pub fn frames(&self) -> TimelineReader<'_> {
        TimelineReader {
            timeline: self,
            clip: 0,
            current: None,
            output_index: 0,
        }
    }
}

struct ClipCursor {
    reader: Box<dyn FrameReader>,
    position: u64,
    len: u64,
}

/// Sequential reader over a timeline's output frames.
///
/// Output frames are renumbered from 0 at the source frame rate.
pub struct TimelineReader<'a> {
    timeline: &'a Timeline,
    clip: usize,
    current: Option<ClipCursor>,
    output_index: u64,
}

impl TimelineReader<'_> {
    pub async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        loop {
            let Some(cursor) = self.current.as_mut() else {
                let Some(clip) = self.timeline.clips.get(self.clip) else {
                    return Ok(None);
                };
                let span = FrameSpan::scene(clip);
                let (first, end) = span.frame_range(self.timeline.info());
                debug!(
                    clip = self.clip,
                    start = clip.start_time,
                    end = clip.end_time,
                    frames = end - first,
                    "Assembling clip"
                );
                self.current = Some(ClipCursor {
                    reader: self.timeline.source.read(span).await?,
                    position: 0,
                    len: end - first,
                });
                continue;
            };

            let Some(frame) = cursor.reader.next_frame().await? else {
                self.current = None;
                self.clip += 1;
                continue;
            };

            let factor = self
                .timeline
                .fade_factor(self.clip, cursor.position, cursor.len);
            cursor.position += 1;

            let out = Frame::new(
                self.output_index,
                self.timeline.info().fps,
                scale_brightness(frame.image, factor),
            );
            self.output_index += 1;
            return Ok(Some(out));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::heuristics::{EmptyDetector, HistogramEmbedder, PresetStylizer};
    use crate::memory::MemoryVideo;

    fn source() -> Arc<dyn Video> {
        Arc::new(MemoryVideo::solid(10.0, 10.0, 4, 4, |i| [200, (i % 256) as u8, 100]))
    }

    fn scenes() -> Vec<Scene> {
        vec![Scene::new(0.0, 1.0).unwrap(), Scene::new(5.0, 6.0).unwrap()]
    }

    async fn drain(timeline: &Timeline) -> Vec<Frame> {
        let mut reader = timeline.frames();
        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame().await.unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_dip_to_black_factor() {
        assert_eq!(dip_to_black_factor(0.0), 1.0);
        assert_eq!(dip_to_black_factor(0.5), 0.0);
        assert_eq!(dip_to_black_factor(1.0), 1.0);
        assert_eq!(dip_to_black_factor(0.25), 0.5);
    }

    #[tokio::test]
    async fn test_empty_clip_list_is_whole_video() {
        let timeline = Timeline::new(source(), Vec::new(), TransitionKind::Cut, 0.5);
        assert_eq!(timeline.clips().len(), 1);
        assert_eq!(timeline.duration(), 10.0);
        assert_eq!(timeline.frame_count(), 100);
    }

    #[tokio::test]
    async fn test_cut_concatenates_in_order() {
        let timeline = Timeline::new(source(), scenes(), TransitionKind::Cut, 0.5);
        let frames = drain(&timeline).await;
        assert_eq!(frames.len(), 20);
        assert_eq!(timeline.frame_count(), 20);
        // Second clip starts at source frame 50
        assert_eq!(frames[10].image.get_pixel(0, 0).0, [200, 50, 100]);
        assert_eq!(frames[10].index, 10);
        assert!(frames.iter().all(|f| f.image.get_pixel(0, 0).0[0] == 200));
    }

    #[tokio::test]
    async fn test_fade_dips_to_black_at_join_only() {
        let timeline = Timeline::new(source(), scenes(), TransitionKind::Fade, 0.4);
        let frames = drain(&timeline).await;
        assert_eq!(frames.len(), 20);

        let red: Vec<u8> = frames.iter().map(|f| f.image.get_pixel(0, 0).0[0]).collect();
        // Two fade frames each side of the join
        assert_eq!(&red[..8], &[200; 8]);
        assert_eq!(red[8], 100);
        assert_eq!(red[9], 0);
        assert_eq!(red[10], 0);
        assert_eq!(red[11], 100);
        assert_eq!(&red[12..], &[200; 8]);
    }

    #[tokio::test]
    async fn test_unknown_transition_degrades_to_cut() {
        let timeline = Timeline::new(
            source(),
            scenes(),
            TransitionKind::Other("wipe".to_string()),
            0.4,
        );
        assert_eq!(timeline.transition(), &TransitionKind::Cut);
        let frames = drain(&timeline).await;
        assert!(frames.iter().all(|f| f.image.get_pixel(0, 0).0[0] == 200));
    }

    #[tokio::test]
    async fn test_styled_video_grades_frames() {
        let models = VisionModels::new(
            Arc::new(HistogramEmbedder::default()),
            Arc::new(EmptyDetector),
            Arc::new(PresetStylizer),
            ModelConfig::default(),
        );
        let styled = StyledVideo::new(source(), models, "vibrant", 1.0);
        let mut reader = styled.read(FrameSpan::full(styled.info())).await.unwrap();
        let frame = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.index, 0);
        assert_ne!(frame.image.get_pixel(0, 0).0, [200, 0, 100]);
        assert_eq!(styled.info().duration, 10.0);
    }
}
