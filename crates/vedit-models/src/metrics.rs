//! Per-scene measurements produced by the scorer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{MotionSample, Scene};

/// Technical image quality of a scene's first sampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct QualityMetrics {
    /// Laplacian variance of the grayscale frame (unbounded)
    pub sharpness: f64,
    /// Grayscale standard deviation
    pub noise_level: f64,
    /// max - min grayscale intensity, 0-255
    pub dynamic_range: f64,
    /// Histogram mean intensity, 0-1
    pub exposure: f64,
}

impl QualityMetrics {
    /// Weighted quality blend.
    ///
    /// Sharpness enters raw. This is the only place the blend is defined; both
    /// the scorer and the optimizer call it.
    pub fn blended_score(&self) -> f64 {
        self.sharpness * 0.3
            + (1.0 - self.noise_level / 255.0) * 0.2
            + (self.dynamic_range / 255.0) * 0.3
            + (1.0 - (self.exposure - 0.5).abs() * 2.0) * 0.2
    }
}

/// Content statistics of a scene's first sampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContentMetrics {
    /// Mean grayscale intensity, 0-255
    pub brightness: f64,
    /// Grayscale standard deviation
    pub contrast: f64,
    /// Laplacian variance
    pub motion: f64,
    /// Mean intensity of the four lower-right rule-of-thirds cells, 0-255
    pub composition_score: f64,
    /// Mean HSV saturation, 0-255
    pub saturation: f64,
    /// Hue variance
    pub color_variance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContinuityMetrics {
    pub continuity_score: f64,
    pub motion_consistency: f64,
    pub object_continuity: f64,
}

/// Everything the scorer knows about one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneAnalysis {
    pub scene: Scene,
    pub quality: QualityMetrics,
    pub content: ContentMetrics,
    /// Clamped to [0, 1]
    pub importance: f64,
    pub continuity: ContinuityMetrics,
    pub motion: Vec<MotionSample>,
}

impl SceneAnalysis {
    /// `0.4·mean(magnitude) + 0.3·mean(direction) + 0.3·mean(variance)`, or 0 without samples.
    pub fn motion_score(&self) -> f64 {
        if self.motion.is_empty() {
            return 0.0;
        }
        let n = self.motion.len() as f64;
        let (mag, dir, var) = self.motion.iter().fold((0.0, 0.0, 0.0), |acc, m| {
            (acc.0 + m.magnitude, acc.1 + m.direction, acc.2 + m.variance)
        });
        0.4 * (mag / n) + 0.3 * (dir / n) + 0.3 * (var / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blended_score_weights() {
        let q = QualityMetrics {
            sharpness: 1.0,
            noise_level: 0.0,
            dynamic_range: 255.0,
            exposure: 0.5,
        };
        assert!((q.blended_score() - 1.0).abs() < 1e-12);

        let dark = QualityMetrics {
            sharpness: 0.0,
            noise_level: 255.0,
            dynamic_range: 0.0,
            exposure: 0.0,
        };
        assert!(dark.blended_score().abs() < 1e-12);
    }

    #[test]
    fn test_motion_score() {
        let mut analysis = SceneAnalysis {
            scene: Scene::new(0.0, 1.0).unwrap(),
            quality: QualityMetrics::default(),
            content: ContentMetrics::default(),
            importance: 0.0,
            continuity: ContinuityMetrics::default(),
            motion: Vec::new(),
        };
        assert_eq!(analysis.motion_score(), 0.0);

        analysis.motion = vec![
            MotionSample {
                magnitude: 1.0,
                direction: 1.0,
                variance: 0.0,
                num_objects: 1,
            },
            MotionSample {
                magnitude: 0.0,
                direction: 1.0,
                variance: 1.0,
                num_objects: 2,
            },
        ];
        // 0.4*0.5 + 0.3*1.0 + 0.3*0.5
        assert!((analysis.motion_score() - 0.65).abs() < 1e-12);
    }
}
