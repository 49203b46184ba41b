#![deny(unreachable_patterns)]
//! Video decoding, scene analysis and output assembly.
//!
//! This crate provides:
//! - Lazy frame sources over FFmpeg (`decode`) or in-memory renders (`memory`)
//! - Embedding-based scene segmentation and keyframe selection
//! - IoU object tracking, per-scene scoring and the keep/drop optimizer
//! - Timeout-bounded access to the embedding, detection and style models
//! - Grading, dip-to-black joins and FFmpeg rendering of the kept scenes

pub mod analysis;
pub mod assembler;
pub mod command;
pub mod config;
pub mod decode;
pub mod error;
pub mod frame;
pub mod heuristics;
pub mod image_ops;
pub mod keyframes;
pub mod memory;
pub mod optimizer;
pub mod probe;
pub mod render;
pub mod sampler;
pub mod scorer;
pub mod segmenter;
pub mod stats;
pub mod tracker;
pub mod vision;

pub use analysis::{content_report, SceneAnalyzer};
pub use assembler::{StyledVideo, Timeline, TimelineReader};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegProgress, FfmpegRunner};
pub use config::{AnalysisConfig, AssemblyConfig, ModelConfig};
pub use decode::{FfmpegVideo, FfmpegVideoLoader};
pub use error::{MediaError, MediaResult};
pub use frame::{Frame, FrameReader, FrameSpan, Video, VideoLoader};
pub use heuristics::{EmptyDetector, HistogramEmbedder, PresetStylizer, StylePreset};
pub use keyframes::select_keyframes;
pub use memory::MemoryVideo;
pub use optimizer::{final_score, kept_scenes, optimize_scenes, OptimizerThresholds};
pub use probe::{probe_video, VideoInfo};
pub use render::{FfmpegRenderer, Renderer};
pub use sampler::FrameSampler;
pub use segmenter::{SampleEmbedding, SceneSegmenter, Segmentation};
pub use tracker::{track_scene, MotionPatterns, ObjectTracker};
pub use vision::{Embedder, ObjectDetector, Stylizer, VisionModels};
