//! Analysis, model and assembly configuration.
//!
//! Every component receives one of these at construction.

use std::time::Duration;

/// Scene analysis configuration.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Cosine similarity below which adjacent samples start a new scene
    pub similarity_threshold: f64,
    /// Fixed sample stride in frames; `None` derives one sample per second from fps
    pub sample_stride: Option<usize>,
    /// IoU a detection must exceed to join an active track
    pub iou_threshold: f64,
    /// Scenes analyzed concurrently within one job
    pub max_scene_parallel: usize,
    /// Keyframes returned when a job does not ask for a count
    pub num_keyframes: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            sample_stride: None,
            iou_threshold: 0.3,
            max_scene_parallel: 4,
            num_keyframes: 5,
        }
    }
}

impl AnalysisConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            similarity_threshold: std::env::var("VEDIT_SIMILARITY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.similarity_threshold),
            sample_stride: std::env::var("VEDIT_SAMPLE_STRIDE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s: &usize| *s > 0),
            max_scene_parallel: std::env::var("VEDIT_MAX_SCENE_PARALLEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_scene_parallel)
                .max(1),
            ..defaults
        }
    }
}

/// Vision model call configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Upper bound on any single embed/detect/stylize call
    pub call_timeout: Duration,
    /// Detections at or below this confidence are discarded
    pub detection_confidence: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            detection_confidence: 0.5,
        }
    }
}

impl ModelConfig {
    pub fn from_env() -> Self {
        Self {
            call_timeout: Duration::from_secs(
                std::env::var("VEDIT_MODEL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            ..Self::default()
        }
    }
}

/// Output rendering configuration.
#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    /// Length of the dip-to-black at each fade join, in seconds
    pub fade_duration: f64,
    pub video_codec: String,
    pub audio_codec: String,
    pub crf: u8,
    pub preset: String,
    /// Timeout for each FFmpeg invocation
    pub render_timeout: Duration,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            fade_duration: 0.5,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            crf: 20,
            preset: "medium".to_string(),
            render_timeout: Duration::from_secs(3600),
        }
    }
}

impl AssemblyConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fade_duration: std::env::var("VEDIT_FADE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s: &f64| *s >= 0.0)
                .unwrap_or(defaults.fade_duration),
            render_timeout: Duration::from_secs(
                std::env::var("VEDIT_RENDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            ..defaults
        }
    }
}
