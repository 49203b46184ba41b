//! Job records and their lifecycle.
//!
//! States only move forward: `pending -> processing -> completed | failed`.
//! A failed job is terminal; retrying means creating a new job.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{
    ContentMetrics, ContinuityMetrics, JobKind, ModelError, ModelResult, MotionSample,
    QualityMetrics, Scene,
};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, not yet picked up by a worker
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage a job is in, each with a fixed progress checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    Queued,
    Processing,
    LoadingVideo,
    DetectingScenes,
    OptimizingScenes,
    AnalyzingContent,
    ApplyingColorGrading,
    AddingTransitions,
    ExtractingKeyframes,
    ExportingVideo,
    Completed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Queued => "queued",
            JobStage::Processing => "processing",
            JobStage::LoadingVideo => "loading_video",
            JobStage::DetectingScenes => "detecting_scenes",
            JobStage::OptimizingScenes => "optimizing_scenes",
            JobStage::AnalyzingContent => "analyzing_content",
            JobStage::ApplyingColorGrading => "applying_color_grading",
            JobStage::AddingTransitions => "adding_transitions",
            JobStage::ExtractingKeyframes => "extracting_keyframes",
            JobStage::ExportingVideo => "exporting_video",
            JobStage::Completed => "completed",
        }
    }

    /// Progress percentage reported when the stage begins.
    pub fn progress(&self) -> u8 {
        match self {
            JobStage::Queued | JobStage::Processing => 0,
            JobStage::LoadingVideo => 10,
            JobStage::DetectingScenes => 30,
            JobStage::OptimizingScenes => 40,
            JobStage::AnalyzingContent => 50,
            JobStage::ApplyingColorGrading => 60,
            JobStage::AddingTransitions | JobStage::ExtractingKeyframes => 70,
            JobStage::ExportingVideo => 80,
            JobStage::Completed => 100,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Content metrics for one scene, as reported in results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneContent {
    pub start_time: f64,
    pub end_time: f64,
    pub analysis: ContentMetrics,
}

/// Payload stored on a completed job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct JobResult {
    pub message: String,
    /// Rendered file; absent for analysis jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub content_analysis: Vec<SceneContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_motion: Option<Vec<Vec<MotionSample>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_continuity: Option<Vec<ContinuityMetrics>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_quality: Option<Vec<QualityMetrics>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_importance: Option<Vec<f64>>,
    /// Keyframe timestamps in seconds, ascending
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyframes: Vec<f64>,
}

/// Durable record of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub id: JobId,
    pub source_path: PathBuf,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub current_stage: JobStage,
    /// Free-form payload attached to the last progress update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

impl JobRecord {
    /// Create a pending job.
    pub fn new(id: JobId, source_path: impl Into<PathBuf>, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_path: source_path.into(),
            kind,
            status: JobStatus::Pending,
            progress: 0,
            current_stage: JobStage::Queued,
            details: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move out of `pending`.
    pub fn start(&mut self) -> ModelResult<()> {
        self.transition(JobStatus::Processing)?;
        self.progress = JobStage::Processing.progress();
        self.current_stage = JobStage::Processing;
        Ok(())
    }

    /// Record a stage checkpoint. Each checkpoint must raise progress.
    pub fn advance(
        &mut self,
        progress: u8,
        stage: JobStage,
        details: Option<serde_json::Value>,
    ) -> ModelResult<()> {
        if self.status != JobStatus::Processing {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: JobStatus::Processing,
            });
        }
        let progress = progress.min(100);
        if progress <= self.progress {
            return Err(ModelError::ProgressRegression {
                current: self.progress,
                requested: progress,
            });
        }
        self.progress = progress;
        self.current_stage = stage;
        self.details = details;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self, result: JobResult) -> ModelResult<()> {
        self.transition(JobStatus::Completed)?;
        self.progress = 100;
        self.current_stage = JobStage::Completed;
        self.completed_at = Some(self.updated_at);
        self.result = Some(result);
        Ok(())
    }

    /// Terminal failure. Stage and progress keep their last recorded values.
    pub fn fail(&mut self, error: impl Into<String>) -> ModelResult<()> {
        self.transition(JobStatus::Failed)?;
        self.completed_at = Some(self.updated_at);
        self.error = Some(error.into());
        Ok(())
    }

    fn transition(&mut self, to: JobStatus) -> ModelResult<()> {
        let allowed = matches!(
            (self.status, to),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Failed)
        );
        if !allowed {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessOptions;

    fn record() -> JobRecord {
        JobRecord::new(
            JobId::new(),
            "/tmp/in.mp4",
            JobKind::Process(ProcessOptions::default()),
        )
    }

    #[test]
    fn test_job_id_generation() {
        let id1 = JobId::new();
        let id2 = JobId::new();
        assert_ne!(id1, id2);
        assert_eq!(JobId::from_string("abc").to_string(), "abc");
    }

    #[test]
    fn test_forward_lifecycle() {
        let mut job = record();
        assert_eq!(job.status, JobStatus::Pending);

        job.start().unwrap();
        job.advance(10, JobStage::LoadingVideo, None).unwrap();
        job.advance(30, JobStage::DetectingScenes, None).unwrap();
        job.complete(JobResult::default()).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.current_stage, JobStage::Completed);
        assert!(job.completed_at.is_some());
        assert!(job.is_terminal());
    }

    #[test]
    fn test_no_backwards_transitions() {
        let mut job = record();
        job.start().unwrap();
        assert!(job.start().is_err());

        job.fail("boom").unwrap();
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(matches!(
            job.start(),
            Err(ModelError::InvalidTransition {
                from: JobStatus::Failed,
                to: JobStatus::Processing
            })
        ));
        assert!(job.complete(JobResult::default()).is_err());
        assert!(job.fail("again").is_err());
    }

    #[test]
    fn test_progress_monotonic() {
        let mut job = record();
        job.start().unwrap();
        job.advance(30, JobStage::DetectingScenes, None).unwrap();
        assert!(matches!(
            job.advance(10, JobStage::LoadingVideo, None),
            Err(ModelError::ProgressRegression { current: 30, requested: 10 })
        ));
        assert_eq!(job.current_stage, JobStage::DetectingScenes);
    }

    #[test]
    fn test_equal_progress_rejected() {
        let mut job = record();
        job.start().unwrap();
        job.advance(30, JobStage::DetectingScenes, Some(serde_json::json!({"scenes": 4})))
            .unwrap();
        let before = job.updated_at;

        assert!(matches!(
            job.advance(30, JobStage::OptimizingScenes, None),
            Err(ModelError::ProgressRegression { current: 30, requested: 30 })
        ));
        assert_eq!(job.progress, 30);
        assert_eq!(job.current_stage, JobStage::DetectingScenes);
        assert_eq!(job.details, Some(serde_json::json!({"scenes": 4})));
        assert_eq!(job.updated_at, before);

        // Starting at 0, a first checkpoint of 0 is a repeat too.
        let mut fresh = record();
        fresh.start().unwrap();
        assert!(fresh.advance(0, JobStage::Processing, None).is_err());
    }

    #[test]
    fn test_advance_requires_processing() {
        let mut job = record();
        assert!(job.advance(10, JobStage::LoadingVideo, None).is_err());
    }

    #[test]
    fn test_stage_checkpoints() {
        assert_eq!(JobStage::Processing.progress(), 0);
        assert_eq!(JobStage::LoadingVideo.progress(), 10);
        assert_eq!(JobStage::DetectingScenes.progress(), 30);
        assert_eq!(JobStage::OptimizingScenes.progress(), 40);
        assert_eq!(JobStage::AnalyzingContent.progress(), 50);
        assert_eq!(JobStage::ApplyingColorGrading.progress(), 60);
        assert_eq!(JobStage::AddingTransitions.progress(), 70);
        assert_eq!(JobStage::ExportingVideo.progress(), 80);
        assert_eq!(JobStage::Completed.progress(), 100);
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let mut job = record();
        job.start().unwrap();
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"status\":\"processing\""));
        let back: JobRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }
}
