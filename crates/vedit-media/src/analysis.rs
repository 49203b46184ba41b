//! Scene analysis orchestration.
//!
//! Segments a video, then scores each scene independently. Scenes share no
//! mutable state, so up to `max_scene_parallel` of them run at once; results
//! come back in scene order.

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{info, warn};

use vedit_models::{ContentMetrics, QualityMetrics, Scene, SceneAnalysis, SceneContent};

use crate::config::AnalysisConfig;
use crate::error::MediaResult;
use crate::frame::{FrameSpan, Video};
use crate::keyframes::select_keyframes;
use crate::sampler::FrameSampler;
use crate::scorer;
use crate::segmenter::{SceneSegmenter, Segmentation};
use crate::tracker::track_scene;
use crate::vision::VisionModels;

#[derive(Clone)]
pub struct SceneAnalyzer {
    config: AnalysisConfig,
    models: VisionModels,
}

impl SceneAnalyzer {
    pub fn new(config: AnalysisConfig, models: VisionModels) -> Self {
        Self { config, models }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn models(&self) -> &VisionModels {
        &self.models
    }

    pub fn sampler(&self, video: &dyn Video) -> FrameSampler {
        FrameSampler::for_video(video.info(), self.config.sample_stride)
    }

    /// Sample, embed and split into scenes.
    pub async fn segment(&self, video: &dyn Video) -> MediaResult<Segmentation> {
        let sampler = self.sampler(video);
        SceneSegmenter::new(self.config.similarity_threshold)
            .segment(video, &sampler, &self.models)
            .await
    }

    /// Score one scene from its first frame and a full tracking pass.
    pub async fn analyze_scene(&self, video: &dyn Video, scene: Scene) -> MediaResult<SceneAnalysis> {
        let first_frame = {
            let mut reader = video.read(FrameSpan::scene(&scene)).await?;
            reader.next_frame().await?
        };

        let (quality, content) = match &first_frame {
            Some(frame) => (
                scorer::quality_metrics(&frame.image),
                scorer::content_metrics(&frame.image),
            ),
            None => {
                warn!(
                    start = scene.start_time,
                    end = scene.end_time,
                    "Scene has no decodable frames"
                );
                (QualityMetrics::default(), ContentMetrics::default())
            }
        };
        drop(first_frame);

        let motion = track_scene(video, &scene, &self.models, self.config.iou_threshold).await?;
        let importance = scorer::importance(&quality, &content, &motion);
        let continuity = scorer::continuity(&motion);

        Ok(SceneAnalysis {
            scene,
            quality,
            content,
            importance,
            continuity,
            motion,
        })
    }

    /// Score every scene, in order.
    pub async fn analyze_scenes(
        &self,
        video: &dyn Video,
        scenes: &[Scene],
    ) -> MediaResult<Vec<SceneAnalysis>> {
        let parallel = self.config.max_scene_parallel.max(1);
        let analyses: Vec<SceneAnalysis> = stream::iter(scenes.iter().copied())
            .map(|scene| self.analyze_scene(video, scene))
            .buffered(parallel)
            .try_collect()
            .await?;

        info!(scenes = analyses.len(), parallel, "Analyzed scenes");
        Ok(analyses)
    }

    /// Keyframe timestamps from the segmentation's sample embeddings.
    pub fn keyframes(&self, segmentation: &Segmentation, count: Option<usize>) -> Vec<f64> {
        select_keyframes(
            &segmentation.samples,
            count.unwrap_or(self.config.num_keyframes),
        )
    }
}

/// Content metrics of the given scenes, in the shape results report them.
pub fn content_report<'a>(analyses: impl IntoIterator<Item = &'a SceneAnalysis>) -> Vec<SceneContent> {
    analyses
        .into_iter()
        .map(|a| SceneContent {
            start_time: a.scene.start_time,
            end_time: a.scene.end_time,
            analysis: a.content,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::heuristics::{EmptyDetector, HistogramEmbedder, PresetStylizer};
    use crate::memory::MemoryVideo;
    use std::sync::Arc;

    fn analyzer() -> SceneAnalyzer {
        SceneAnalyzer::new(
            AnalysisConfig::default(),
            VisionModels::new(
                Arc::new(HistogramEmbedder::default()),
                Arc::new(EmptyDetector),
                Arc::new(PresetStylizer),
                ModelConfig::default(),
            ),
        )
    }

    #[tokio::test]
    async fn test_analyze_scenes_in_order() {
        let video = MemoryVideo::solid(10.0, 2.0, 12, 12, |i| {
            if i < 10 {
                [250, 250, 250]
            } else {
                [0, 0, 0]
            }
        });
        let analyzer = analyzer();
        let segmentation = analyzer.segment(&video).await.unwrap();
        assert_eq!(segmentation.scenes.len(), 2);

        let analyses = analyzer
            .analyze_scenes(&video, &segmentation.scenes)
            .await
            .unwrap();
        assert_eq!(analyses.len(), 2);
        assert_eq!(analyses[0].scene, segmentation.scenes[0]);
        assert!(analyses[0].content.brightness > analyses[1].content.brightness);

        // No detections: every frame is a zero sample with zero objects.
        assert_eq!(analyses[0].motion.len(), 10);
        assert_eq!(analyses[0].continuity.object_continuity, 1.0);
        assert!((0.0..=1.0).contains(&analyses[0].importance));

        let report = content_report(&analyses);
        assert_eq!(report[1].start_time, 5.0);
    }

    #[tokio::test]
    async fn test_keyframes_from_segmentation() {
        let video = MemoryVideo::solid(6.0, 1.0, 8, 8, |i| match i {
            0..=1 => [200, 0, 0],
            2..=3 => [0, 200, 0],
            _ => [0, 0, 200],
        });
        let analyzer = analyzer();
        let segmentation = analyzer.segment(&video).await.unwrap();
        let keyframes = analyzer.keyframes(&segmentation, Some(3));
        assert_eq!(keyframes, vec![0.0, 2.0, 4.0]);
    }
}
