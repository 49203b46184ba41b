//! Scene segmentation from embedding similarity.
//!
//! Adjacent samples whose embeddings have cosine similarity below the
//! threshold are separated by a scene boundary. There is no smoothing or
//! hysteresis: one outlier sample is enough to split a scene.

use tracing::{debug, info};

use vedit_models::Scene;

use crate::error::{MediaError, MediaResult};
use crate::frame::Video;
use crate::sampler::FrameSampler;
use crate::vision::VisionModels;

/// Embedding of one sampled frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleEmbedding {
    pub timestamp: f64,
    pub embedding: Vec<f64>,
}

/// Segmentation output. The embeddings are kept for keyframe selection.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub scenes: Vec<Scene>,
    pub samples: Vec<SampleEmbedding>,
    /// Sample indices at which a new scene starts
    pub boundaries: Vec<usize>,
}

/// Cosine similarity of two vectors.
///
/// Two zero vectors are identical (1.0); a zero and a non-zero vector share
/// nothing (0.0).
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    match (norm_a == 0.0, norm_b == 0.0) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        _ => dot / (norm_a * norm_b),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SceneSegmenter {
    threshold: f64,
}

impl SceneSegmenter {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Sample indices `i + 1` for every adjacent pair with `sim < threshold`.
    pub fn boundaries(&self, embeddings: &[Vec<f64>]) -> MediaResult<Vec<usize>> {
        let mut boundaries = Vec::new();
        for (i, pair) in embeddings.windows(2).enumerate() {
            if pair[0].len() != pair[1].len() {
                return Err(MediaError::model_failed(
                    "embedding",
                    format!(
                        "embedding length changed from {} to {} at sample {}",
                        pair[0].len(),
                        pair[1].len(),
                        i + 1
                    ),
                ));
            }
            let sim = cosine_similarity(&pair[0], &pair[1]);
            if sim < self.threshold {
                debug!(sample = i + 1, similarity = sim, "Scene boundary");
                boundaries.push(i + 1);
            }
        }
        Ok(boundaries)
    }

    /// Turn boundaries into scenes.
    ///
    /// Cut points are `0`, each boundary's timestamp, and the end of the last
    /// sample interval (capped at `duration`). Fewer than two samples give no
    /// scenes.
    pub fn scenes_from_boundaries(
        boundaries: &[usize],
        num_samples: usize,
        samples_per_second: f64,
        duration: f64,
    ) -> Vec<Scene> {
        if num_samples < 2 || samples_per_second <= 0.0 {
            return Vec::new();
        }
        let end = (num_samples as f64 / samples_per_second).min(duration);

        let mut cuts = Vec::with_capacity(boundaries.len() + 2);
        cuts.push(0.0);
        cuts.extend(
            boundaries
                .iter()
                .map(|b| *b as f64 / samples_per_second)
                .filter(|t| *t < end),
        );
        cuts.push(end);

        cuts.windows(2)
            .filter_map(|w| Scene::new(w[0], w[1]).ok())
            .collect()
    }

    /// Embed every sample and split the video into scenes.
    pub async fn segment(
        &self,
        video: &dyn Video,
        sampler: &FrameSampler,
        models: &VisionModels,
    ) -> MediaResult<Segmentation> {
        let mut reader = sampler.samples(video).await?;
        let mut samples = Vec::new();
        while let Some(frame) = reader.next_frame().await? {
            let embedding = models.embed(&frame.image).await?;
            samples.push(SampleEmbedding {
                timestamp: frame.timestamp,
                embedding,
            });
        }
        drop(reader);

        let embeddings: Vec<Vec<f64>> = samples.iter().map(|s| s.embedding.clone()).collect();
        let boundaries = self.boundaries(&embeddings)?;
        let scenes = Self::scenes_from_boundaries(
            &boundaries,
            samples.len(),
            sampler.samples_per_second(),
            video.info().duration,
        );

        info!(
            samples = samples.len(),
            boundaries = boundaries.len(),
            scenes = scenes.len(),
            "Segmented video"
        );

        Ok(Segmentation {
            scenes,
            samples,
            boundaries,
        })
    }
}
