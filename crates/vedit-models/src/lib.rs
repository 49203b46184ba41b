//! Shared data models for the vedit scene editing pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Scenes, detections, tracks and per-frame motion samples
//! - Quality, content and continuity metrics
//! - Job options (`JobKind`) with intake validation
//! - Job records and the `pending -> processing -> completed | failed` state machine

pub mod error;
pub mod geometry;
pub mod job;
pub mod metrics;
pub mod options;
pub mod scene;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use geometry::{BoundingBox, Detection};
pub use job::{JobId, JobRecord, JobResult, JobStage, JobStatus, SceneContent};
pub use metrics::{ContentMetrics, ContinuityMetrics, QualityMetrics, SceneAnalysis};
pub use options::{AnalyzeOptions, JobKind, ProcessOptions, TransitionKind, MAX_KEYFRAMES};
pub use scene::{MotionSample, Scene, Track};
