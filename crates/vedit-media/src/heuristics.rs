//! Model-free vision providers.
//!
//! These let the pipeline run without neural models: an HSV histogram as the
//! embedding, a detector that never reports anything, and preset colour
//! grading as the style function.

use async_trait::async_trait;
use image::{imageops, RgbImage};
use rayon::prelude::*;
use tracing::debug;

use vedit_models::Detection;

use crate::error::MediaResult;
use crate::image_ops::rgb_to_hsv;
use crate::vision::{Embedder, ObjectDetector, Stylizer};

const THUMB_WIDTH: u32 = 160;
const THUMB_HEIGHT: u32 = 90;

/// Normalized joint HSV histogram with `bins^3` entries.
#[derive(Debug, Clone)]
pub struct HistogramEmbedder {
    bins: usize,
}

impl Default for HistogramEmbedder {
    fn default() -> Self {
        Self { bins: 8 }
    }
}

impl HistogramEmbedder {
    pub fn new(bins: usize) -> Self {
        Self { bins: bins.max(1) }
    }

    pub fn histogram(&self, frame: &RgbImage) -> Vec<f64> {
        let small;
        let frame = if frame.width() > THUMB_WIDTH || frame.height() > THUMB_HEIGHT {
            small = imageops::thumbnail(frame, THUMB_WIDTH, THUMB_HEIGHT);
            &small
        } else {
            frame
        };

        let bins = self.bins;
        let mut histogram = vec![0.0; bins * bins * bins];
        for p in frame.pixels() {
            let (h, s, v) = rgb_to_hsv(
                p[0] as f64 / 255.0,
                p[1] as f64 / 255.0,
                p[2] as f64 / 255.0,
            );
            let h_bin = ((h / 360.0) * bins as f64).min(bins as f64 - 1.0) as usize;
            let s_bin = (s * bins as f64).min(bins as f64 - 1.0) as usize;
            let v_bin = (v * bins as f64).min(bins as f64 - 1.0) as usize;
            histogram[h_bin * bins * bins + s_bin * bins + v_bin] += 1.0;
        }

        let total: f64 = histogram.iter().sum();
        if total > 0.0 {
            for val in &mut histogram {
                *val /= total;
            }
        }
        histogram
    }
}

#[async_trait]
impl Embedder for HistogramEmbedder {
    async fn embed(&self, frame: &RgbImage) -> MediaResult<Vec<f64>> {
        Ok(self.histogram(frame))
    }

    fn name(&self) -> &'static str {
        "hsv_histogram"
    }
}

/// Detector that reports no objects.
#[derive(Debug, Clone, Default)]
pub struct EmptyDetector;

#[async_trait]
impl ObjectDetector for EmptyDetector {
    async fn detect(&self, _frame: &RgbImage) -> MediaResult<Vec<Detection>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Colour grading parameters for a named look.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StylePreset {
    /// Positive warms, negative cools
    pub color_temperature: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub brightness: f64,
    pub shadows: f64,
    pub highlights: f64,
}

impl StylePreset {
    pub const CINEMATIC: StylePreset = StylePreset {
        color_temperature: 0.1,
        contrast: 1.2,
        saturation: 1.1,
        brightness: 1.05,
        shadows: 0.9,
        highlights: 1.1,
    };

    pub const VIBRANT: StylePreset = StylePreset {
        color_temperature: 0.2,
        contrast: 1.3,
        saturation: 1.4,
        brightness: 1.1,
        shadows: 0.95,
        highlights: 1.2,
    };

    pub const MUTED: StylePreset = StylePreset {
        color_temperature: -0.1,
        contrast: 1.1,
        saturation: 0.9,
        brightness: 1.0,
        shadows: 1.05,
        highlights: 0.95,
    };

    /// Look up a preset; unknown ids get the cinematic look.
    pub fn by_name(name: &str) -> StylePreset {
        match name.trim().to_lowercase().as_str() {
            "vibrant" => Self::VIBRANT,
            "muted" => Self::MUTED,
            "cinematic" => Self::CINEMATIC,
            other => {
                debug!(style = other, "Unknown style, using cinematic");
                Self::CINEMATIC
            }
        }
    }

    /// Grade one pixel (channels in 0-1).
    fn grade(&self, rgb: [f64; 3]) -> [f64; 3] {
        let [mut r, mut g, mut b] = rgb;

        r += 0.1 * self.color_temperature;
        b -= 0.1 * self.color_temperature;

        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        r = luma + (r - luma) * self.saturation;
        g = luma + (g - luma) * self.saturation;
        b = luma + (b - luma) * self.saturation;

        let tone = self.shadows + (self.highlights - self.shadows) * luma.clamp(0.0, 1.0);
        let adjust = |c: f64| ((c - 0.5) * self.contrast + 0.5) * self.brightness * tone;
        [adjust(r), adjust(g), adjust(b)]
    }
}

/// Applies [`StylePreset`] colour grading, blended by strength.
#[derive(Debug, Clone, Default)]
pub struct PresetStylizer;

impl PresetStylizer {
    pub fn apply(&self, mut frame: RgbImage, style: &str, strength: f64) -> RgbImage {
        let preset = StylePreset::by_name(style);
        let strength = strength.clamp(0.0, 1.0);
        if strength == 0.0 {
            return frame;
        }

        frame.par_chunks_mut(3).for_each(|px| {
            let original = [
                px[0] as f64 / 255.0,
                px[1] as f64 / 255.0,
                px[2] as f64 / 255.0,
            ];
            let graded = preset.grade(original);
            for c in 0..3 {
                let v = (1.0 - strength) * original[c] + strength * graded[c].clamp(0.0, 1.0);
                px[c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        });
        frame
    }
}

#[async_trait]
impl Stylizer for PresetStylizer {
    async fn stylize(&self, frame: RgbImage, style: &str, strength: f64) -> MediaResult<RgbImage> {
        Ok(self.apply(frame, style, strength))
    }

    fn name(&self) -> &'static str {
        "preset_grading"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_histogram_is_normalized() {
        let embedder = HistogramEmbedder::default();
        let frame = RgbImage::from_fn(320, 180, |x, _| Rgb([(x % 256) as u8, 40, 200]));
        let hist = embedder.histogram(&frame);
        assert_eq!(hist.len(), 512);
        assert!((hist.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_distinct_colours_have_disjoint_histograms() {
        let embedder = HistogramEmbedder::default();
        let red = embedder.histogram(&RgbImage::from_pixel(8, 8, Rgb([220, 10, 10])));
        let blue = embedder.histogram(&RgbImage::from_pixel(8, 8, Rgb([10, 10, 220])));
        let dot: f64 = red.iter().zip(&blue).map(|(a, b)| a * b).sum();
        assert_eq!(dot, 0.0);
    }

    #[test]
    fn test_unknown_style_falls_back_to_cinematic() {
        assert_eq!(StylePreset::by_name("noir"), StylePreset::CINEMATIC);
        assert_eq!(StylePreset::by_name("Vibrant"), StylePreset::VIBRANT);
    }

    #[test]
    fn test_zero_strength_is_identity() {
        let frame = RgbImage::from_pixel(4, 4, Rgb([10, 100, 200]));
        let out = PresetStylizer.apply(frame.clone(), "vibrant", 0.0);
        assert_eq!(out, frame);
    }

    #[test]
    fn test_strength_blends_towards_graded() {
        let frame = RgbImage::from_pixel(2, 2, Rgb([60, 120, 180]));
        let full = PresetStylizer.apply(frame.clone(), "vibrant", 1.0);
        let half = PresetStylizer.apply(frame.clone(), "vibrant", 0.5);
        for c in 0..3 {
            let o = frame.get_pixel(0, 0)[c] as i32;
            let f = full.get_pixel(0, 0)[c] as i32;
            let h = half.get_pixel(0, 0)[c] as i32;
            assert!((h - (o + f) / 2).abs() <= 1, "channel {c}: {o} {h} {f}");
        }
        assert_ne!(full, frame);
    }
}
