//! Keep/drop selection over analyzed scenes.

use tracing::debug;

use vedit_models::{ProcessOptions, Scene, SceneAnalysis};

/// Thresholds a scene must meet to be kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerThresholds {
    pub min_quality: f64,
    pub min_importance: f64,
    pub min_object_continuity: f64,
}

impl Default for OptimizerThresholds {
    fn default() -> Self {
        Self {
            min_quality: 0.6,
            min_importance: 0.4,
            min_object_continuity: 0.5,
        }
    }
}

impl From<&ProcessOptions> for OptimizerThresholds {
    fn from(opts: &ProcessOptions) -> Self {
        Self {
            min_quality: opts.min_quality,
            min_importance: opts.min_importance,
            min_object_continuity: opts.min_object_continuity,
        }
    }
}

/// `0.3·quality + 0.3·importance + 0.2·continuity + 0.2·motion`.
pub fn final_score(analysis: &SceneAnalysis) -> f64 {
    analysis.quality.blended_score() * 0.3
        + analysis.importance * 0.3
        + analysis.continuity.continuity_score * 0.2
        + analysis.motion_score() * 0.2
}

/// Whether one scene passes every threshold.
pub fn keep_scene(analysis: &SceneAnalysis, thresholds: &OptimizerThresholds) -> bool {
    let score = final_score(analysis);
    let keep = score >= thresholds.min_quality
        && analysis.importance >= thresholds.min_importance
        && analysis.continuity.object_continuity >= thresholds.min_object_continuity;
    debug!(
        start = analysis.scene.start_time,
        end = analysis.scene.end_time,
        final_score = score,
        importance = analysis.importance,
        object_continuity = analysis.continuity.object_continuity,
        keep,
        "Scene decision"
    );
    keep
}

/// Drop scenes that fail the thresholds. Order is preserved; nothing is
/// merged or reordered, so re-running on the output is a no-op.
pub fn optimize_scenes<'a>(
    analyses: &'a [SceneAnalysis],
    thresholds: &OptimizerThresholds,
) -> Vec<&'a SceneAnalysis> {
    analyses
        .iter()
        .filter(|a| keep_scene(a, thresholds))
        .collect()
}

/// Scene intervals of the kept analyses.
pub fn kept_scenes(analyses: &[&SceneAnalysis]) -> Vec<Scene> {
    analyses.iter().map(|a| a.scene).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vedit_models::{ContentMetrics, ContinuityMetrics, MotionSample, QualityMetrics};

    fn analysis(start: f64, quality_level: f64, importance: f64, object_continuity: f64) -> SceneAnalysis {
        SceneAnalysis {
            scene: Scene::new(start, start + 1.0).unwrap(),
            quality: QualityMetrics {
                sharpness: quality_level,
                noise_level: 0.0,
                dynamic_range: 255.0,
                exposure: 0.5,
            },
            content: ContentMetrics::default(),
            importance,
            continuity: ContinuityMetrics {
                continuity_score: 1.0,
                motion_consistency: 1.0,
                object_continuity,
            },
            motion: vec![MotionSample::default(); 2],
        }
    }

    fn scenes() -> Vec<SceneAnalysis> {
        vec![
            analysis(0.0, 1.0, 0.9, 1.0),
            analysis(1.0, 0.0, 0.1, 1.0),
            analysis(2.0, 0.5, 0.6, 1.0),
            analysis(3.0, 1.0, 0.9, 0.2),
            analysis(4.0, 2.0, 0.5, 0.5),
        ]
    }

    #[test]
    fn test_final_score() {
        // quality blend 1.0, importance 0.9, continuity 1.0, motion 0
        let a = analysis(0.0, 1.0, 0.9, 1.0);
        assert!((final_score(&a) - (0.3 + 0.27 + 0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_filters_and_preserves_order() {
        let all = scenes();
        let kept = optimize_scenes(&all, &OptimizerThresholds::default());
        let starts: Vec<f64> = kept.iter().map(|a| a.scene.start_time).collect();
        assert_eq!(starts, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_idempotent() {
        let all = scenes();
        let thresholds = OptimizerThresholds::default();
        let once: Vec<SceneAnalysis> = optimize_scenes(&all, &thresholds)
            .into_iter()
            .cloned()
            .collect();
        let twice = optimize_scenes(&once, &thresholds);
        assert_eq!(kept_scenes(&twice), once.iter().map(|a| a.scene).collect::<Vec<_>>());
    }

    #[test]
    fn test_monotonic_in_min_quality() {
        let all = scenes();
        let mut previous = usize::MAX;
        for step in 0..=20 {
            let thresholds = OptimizerThresholds {
                min_quality: step as f64 * 0.05,
                min_importance: 0.0,
                min_object_continuity: 0.0,
            };
            let count = optimize_scenes(&all, &thresholds).len();
            assert!(count <= previous);
            previous = count;
        }
    }
}
