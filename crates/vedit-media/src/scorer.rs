//! Per-scene quality, content, importance and continuity scores.
//!
//! Quality, content and importance look at a single frame (the scene's first
//! sample). Continuity and the importance motion boost use the full per-frame
//! tracking pass. Every function here is pure.

use image::RgbImage;

use vedit_models::{ContentMetrics, ContinuityMetrics, MotionSample, QualityMetrics};

use crate::image_ops::{hue_saturation, GrayPlane};
use crate::stats::{mean, std_deviation, variance};

/// Technical quality of one frame.
pub fn quality_metrics(frame: &RgbImage) -> QualityMetrics {
    let gray = GrayPlane::from_rgb(frame);
    quality_from_gray(&gray)
}

fn quality_from_gray(gray: &GrayPlane) -> QualityMetrics {
    let (lo, hi) = gray.min_max();
    QualityMetrics {
        sharpness: gray.laplacian_variance(),
        noise_level: std_deviation(&gray.data),
        dynamic_range: if gray.data.is_empty() { 0.0 } else { hi - lo },
        exposure: gray.histogram_exposure(),
    }
}

/// Content statistics of one frame.
pub fn content_metrics(frame: &RgbImage) -> ContentMetrics {
    let gray = GrayPlane::from_rgb(frame);
    let (hue, saturation) = hue_saturation(frame);

    ContentMetrics {
        brightness: mean(&gray.data),
        contrast: std_deviation(&gray.data),
        motion: gray.laplacian_variance(),
        composition_score: composition_score(&gray),
        saturation: mean(&saturation),
        color_variance: variance(&hue),
    }
}

/// Mean intensity (0-255) of the rule-of-thirds cells below and right of the
/// top-left third. Importance weights this raw value, so any frame brighter
/// than about 5/255 there saturates importance before the clamp.
fn composition_score(gray: &GrayPlane) -> f64 {
    let third_h = gray.height / 3;
    let third_w = gray.width / 3;
    if third_h == 0 || third_w == 0 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 1..3 {
        for j in 1..3 {
            total += gray.region_mean(
                j * third_w,
                i * third_h,
                (j + 1) * third_w,
                (i + 1) * third_h,
            );
        }
    }
    total / 4.0
}

/// Importance in `[0, 1]`.
///
/// A weighted sum of composition, contrast, sharpness, dynamic range and
/// inverse noise, scaled up by motion when motion samples exist, then clamped.
pub fn importance(quality: &QualityMetrics, content: &ContentMetrics, motion: &[MotionSample]) -> f64 {
    let mut score = content.composition_score * 0.2
        + (content.contrast / 255.0) * 0.15
        + (quality.sharpness / 1000.0) * 0.15
        + (quality.dynamic_range / 255.0) * 0.15
        + (1.0 - quality.noise_level / 255.0) * 0.1;

    if !motion.is_empty() {
        let avg_motion = mean_of(motion, |m| m.magnitude);
        let avg_smoothness = mean_of(motion, |m| m.direction);
        let avg_interaction = mean_of(motion, |m| m.variance);
        let avg_objects = mean_of(motion, |m| m.num_objects as f64);

        score *= 1.0
            + 0.2 * avg_motion
            + 0.2 * avg_smoothness
            + 0.2 * avg_interaction
            + 0.1 * (avg_objects / 10.0);
    }

    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

/// Continuity of a scene's motion samples. All zeros below two samples.
pub fn continuity(motion: &[MotionSample]) -> ContinuityMetrics {
    if motion.len() < 2 {
        return ContinuityMetrics::default();
    }

    let directions: Vec<f64> = motion.iter().map(|m| m.direction).collect();
    let counts: Vec<f64> = motion.iter().map(|m| m.num_objects as f64).collect();
    let interactions: Vec<f64> = motion.iter().map(|m| m.variance).collect();

    let motion_consistency = 1.0 / (1.0 + variance(&directions));
    let object_continuity = 1.0 / (1.0 + variance(&counts));

    ContinuityMetrics {
        continuity_score: motion_consistency * 0.4
            + object_continuity * 0.3
            + (1.0 - mean(&interactions)) * 0.3,
        motion_consistency,
        object_continuity,
    }
}

fn mean_of(motion: &[MotionSample], f: impl Fn(&MotionSample) -> f64) -> f64 {
    let values: Vec<f64> = motion.iter().map(f).collect();
    mean(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sample(magnitude: f64, direction: f64, variance: f64, num_objects: usize) -> MotionSample {
        MotionSample {
            magnitude,
            direction,
            variance,
            num_objects,
        }
    }

    #[test]
    fn test_quality_of_flat_frame() {
        let q = quality_metrics(&RgbImage::from_pixel(9, 9, Rgb([128, 128, 128])));
        assert_eq!(q.sharpness, 0.0);
        assert_eq!(q.noise_level, 0.0);
        assert_eq!(q.dynamic_range, 0.0);
        assert!((q.exposure - 128.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn test_content_composition_raw_intensity() {
        let c = content_metrics(&RgbImage::from_pixel(9, 9, Rgb([255, 255, 255])));
        assert!((c.composition_score - 255.0).abs() < 1e-9);
        assert!((c.brightness - 255.0).abs() < 1e-9);
        assert_eq!(c.saturation, 0.0);
        assert_eq!(c.color_variance, 0.0);
    }

    #[test]
    fn test_importance_of_flat_gray_frame() {
        let frame = RgbImage::from_pixel(9, 9, Rgb([128, 128, 128]));
        let quality = quality_metrics(&frame);
        let content = content_metrics(&frame);
        assert!((content.composition_score - 128.0).abs() < 1e-9);
        // 128 * 0.2 alone exceeds 1.
        assert_eq!(importance(&quality, &content, &[]), 1.0);

        let black = RgbImage::from_pixel(9, 9, Rgb([0, 0, 0]));
        let score = importance(&quality_metrics(&black), &content_metrics(&black), &[]);
        assert!((score - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_importance_clamped_under_extreme_boost() {
        let quality = QualityMetrics {
            sharpness: 1.0e9,
            noise_level: 0.0,
            dynamic_range: 255.0,
            exposure: 0.5,
        };
        let content = ContentMetrics {
            composition_score: 1.0,
            contrast: 255.0,
            ..Default::default()
        };
        let motion = vec![sample(1.0e6, 1.0, 1.0, 50); 3];
        assert_eq!(importance(&quality, &content, &motion), 1.0);

        let negative = QualityMetrics {
            noise_level: 1.0e6,
            ..Default::default()
        };
        assert_eq!(importance(&negative, &ContentMetrics::default(), &[]), 0.0);
    }

    #[test]
    fn test_importance_motion_boost() {
        let quality = QualityMetrics {
            noise_level: 255.0,
            ..Default::default()
        };
        let content = ContentMetrics {
            composition_score: 1.0,
            ..Default::default()
        };
        // Base 0.2; boost 1 + 0.2*1 = 1.2
        let motion = vec![sample(0.0, 1.0, 0.0, 0); 2];
        assert!((importance(&quality, &content, &[]) - 0.2).abs() < 1e-12);
        assert!((importance(&quality, &content, &motion) - 0.24).abs() < 1e-12);
    }

    #[test]
    fn test_continuity() {
        assert_eq!(continuity(&[]), ContinuityMetrics::default());
        assert_eq!(continuity(&[sample(0.0, 1.0, 0.0, 1)]), ContinuityMetrics::default());

        let steady = continuity(&[sample(0.0, 0.0, 0.0, 0); 4]);
        assert_eq!(steady.motion_consistency, 1.0);
        assert_eq!(steady.object_continuity, 1.0);
        assert!((steady.continuity_score - 1.0).abs() < 1e-12);

        // Object counts 0, 2 -> variance 1 -> continuity 0.5
        let flicker = continuity(&[sample(0.0, 0.0, 0.0, 0), sample(0.0, 0.0, 0.0, 2)]);
        assert_eq!(flicker.object_continuity, 0.5);
    }
}
