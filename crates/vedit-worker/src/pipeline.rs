//! Stage-by-stage job pipeline.
//!
//! A process job runs
//! `loading_video -> detecting_scenes -> [optimizing_scenes] -> [analyzing_content]
//! -> applying_color_grading -> [adding_transitions] -> exporting_video`;
//! an analyze job runs
//! `loading_video -> detecting_scenes -> [analyzing_content] -> extracting_keyframes`.
//! The opened video is owned by the run and dropped on every exit path.

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use vedit_media::{
    content_report, kept_scenes, optimize_scenes, AssemblyConfig, OptimizerThresholds,
    Renderer, SceneAnalyzer, Segmentation, StyledVideo, Timeline, Video, VideoLoader,
};
use vedit_models::{
    AnalyzeOptions, JobKind, JobRecord, JobResult, JobStage, ProcessOptions, Scene,
    SceneAnalysis,
};

use crate::error::{StageResultExt, WorkerResult};
use crate::progress::ProgressReporter;

const OUTPUT_SUFFIX: &str = "processed.mp4";

/// Everything a job run needs, built once per worker.
pub struct Pipeline {
    loader: Arc<dyn VideoLoader>,
    analyzer: SceneAnalyzer,
    renderer: Arc<dyn Renderer>,
    assembly: AssemblyConfig,
    output_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        loader: Arc<dyn VideoLoader>,
        analyzer: SceneAnalyzer,
        renderer: Arc<dyn Renderer>,
        assembly: AssemblyConfig,
    ) -> Self {
        Self {
            loader,
            analyzer,
            renderer,
            assembly,
            output_dir: None,
        }
    }

    /// Write rendered output into `dir` instead of next to the source.
    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn loader(&self) -> &dyn VideoLoader {
        self.loader.as_ref()
    }

    /// `<stem>.processed.mp4`, next to the source or in the output directory.
    pub fn output_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let file_name = format!("{}.{}", stem, OUTPUT_SUFFIX);
        match &self.output_dir {
            Some(dir) => dir.join(file_name),
            None => source.with_file_name(file_name),
        }
    }

    /// Run every stage of `job`, reporting each checkpoint.
    pub async fn run(&self, job: &JobRecord, progress: &mut ProgressReporter) -> WorkerResult<JobResult> {
        match &job.kind {
            JobKind::Process(opts) => self.process(job, opts, progress).await,
            JobKind::Analyze(opts) => self.analyze(job, opts, progress).await,
        }
    }

    async fn open(&self, job: &JobRecord, progress: &mut ProgressReporter) -> WorkerResult<Arc<dyn Video>> {
        progress
            .enter(
                JobStage::LoadingVideo,
                Some(json!({ "source": job.source_path.display().to_string() })),
            )
            .await?;
        self.loader
            .open(&job.source_path)
            .await
            .in_stage(JobStage::LoadingVideo)
    }

    async fn detect(&self, video: &dyn Video, progress: &mut ProgressReporter) -> WorkerResult<Segmentation> {
        progress.enter(JobStage::DetectingScenes, None).await?;
        let segmentation = self
            .analyzer
            .segment(video)
            .await
            .in_stage(JobStage::DetectingScenes)?;
        progress.logger().scenes_detected(segmentation.scenes.len());
        Ok(segmentation)
    }

    async fn process(
        &self,
        job: &JobRecord,
        opts: &ProcessOptions,
        progress: &mut ProgressReporter,
    ) -> WorkerResult<JobResult> {
        let video = self.open(job, progress).await?;
        let segmentation = self.detect(video.as_ref(), progress).await?;

        let wants_analysis = opts.optimize_scenes
            || opts.analyze_content
            || opts.analyze_motion
            || opts.analyze_continuity;
        let mut analyses: Option<Vec<SceneAnalysis>> = None;

        if opts.optimize_scenes {
            progress
                .enter(
                    JobStage::OptimizingScenes,
                    Some(json!({ "scenes": segmentation.scenes.len() })),
                )
                .await?;
            analyses = Some(
                self.analyzer
                    .analyze_scenes(video.as_ref(), &segmentation.scenes)
                    .await
                    .in_stage(JobStage::OptimizingScenes)?,
            );
        }

        if opts.analyze_content {
            progress.enter(JobStage::AnalyzingContent, None).await?;
            if analyses.is_none() {
                analyses = Some(
                    self.analyzer
                        .analyze_scenes(video.as_ref(), &segmentation.scenes)
                        .await
                        .in_stage(JobStage::AnalyzingContent)?,
                );
            }
        }

        if wants_analysis && analyses.is_none() {
            // Motion or continuity alone: scored as part of detection.
            analyses = Some(
                self.analyzer
                    .analyze_scenes(video.as_ref(), &segmentation.scenes)
                    .await
                    .in_stage(JobStage::DetectingScenes)?,
            );
        }

        let all: Vec<&SceneAnalysis> = analyses.iter().flatten().collect();
        let kept: Vec<&SceneAnalysis> = match &analyses {
            Some(analyses) if opts.optimize_scenes => {
                let kept = optimize_scenes(analyses, &OptimizerThresholds::from(opts));
                info!(
                    job_id = %job.id,
                    detected = analyses.len(),
                    kept = kept.len(),
                    "Optimized scenes"
                );
                kept
            }
            _ => all,
        };
        let scenes: Vec<Scene> = if opts.optimize_scenes {
            kept_scenes(&kept)
        } else {
            segmentation.scenes.clone()
        };
        if scenes.is_empty() {
            progress.logger().nothing_selected();
        }

        progress
            .enter(
                JobStage::ApplyingColorGrading,
                Some(json!({ "style": opts.style, "strength": opts.strength })),
            )
            .await?;
        let styled: Arc<dyn Video> = Arc::new(StyledVideo::new(
            Arc::clone(&video),
            self.analyzer.models().clone(),
            opts.style.clone(),
            opts.strength,
        ));

        let transition = opts.transition_kind();
        if !scenes.is_empty() {
            progress
                .enter(
                    JobStage::AddingTransitions,
                    Some(json!({ "transition": transition.to_string(), "clips": scenes.len() })),
                )
                .await?;
        }
        let timeline = Timeline::new(
            styled,
            scenes.clone(),
            transition,
            self.assembly.fade_duration,
        );
        debug!(
            job_id = %job.id,
            clips = timeline.clips().len(),
            duration = timeline.duration(),
            "Built timeline"
        );

        let output = self.output_path(&job.source_path);
        progress
            .enter(
                JobStage::ExportingVideo,
                Some(json!({ "output": output.display().to_string() })),
            )
            .await?;
        let output_path = self
            .renderer
            .render(&timeline, &job.source_path, &output)
            .await
            .in_stage(JobStage::ExportingVideo)?;
        drop(timeline);
        drop(video);

        Ok(JobResult {
            message: "Video processed successfully".to_string(),
            output_path: Some(output_path),
            scenes,
            content_analysis: if opts.analyze_content {
                content_report(kept.iter().copied())
            } else {
                Vec::new()
            },
            scene_motion: opts
                .analyze_motion
                .then(|| kept.iter().map(|a| a.motion.clone()).collect()),
            scene_continuity: opts
                .analyze_continuity
                .then(|| kept.iter().map(|a| a.continuity).collect()),
            ..Default::default()
        })
    }

    async fn analyze(
        &self,
        job: &JobRecord,
        opts: &AnalyzeOptions,
        progress: &mut ProgressReporter,
    ) -> WorkerResult<JobResult> {
        let video = self.open(job, progress).await?;
        let segmentation = self.detect(video.as_ref(), progress).await?;

        let wants_analysis = opts.analyze_content || opts.analyze_motion || opts.analyze_continuity;
        let mut analyses: Vec<SceneAnalysis> = Vec::new();
        if opts.analyze_content {
            progress.enter(JobStage::AnalyzingContent, None).await?;
            analyses = self
                .analyzer
                .analyze_scenes(video.as_ref(), &segmentation.scenes)
                .await
                .in_stage(JobStage::AnalyzingContent)?;
        } else if wants_analysis {
            analyses = self
                .analyzer
                .analyze_scenes(video.as_ref(), &segmentation.scenes)
                .await
                .in_stage(JobStage::DetectingScenes)?;
        }
        drop(video);

        progress
            .enter(
                JobStage::ExtractingKeyframes,
                Some(json!({ "num_keyframes": opts.num_keyframes })),
            )
            .await?;
        let keyframes = self
            .analyzer
            .keyframes(&segmentation, Some(opts.num_keyframes));

        Ok(JobResult {
            message: "Video analyzed successfully".to_string(),
            output_path: None,
            scenes: segmentation.scenes,
            content_analysis: if opts.analyze_content {
                content_report(&analyses)
            } else {
                Vec::new()
            },
            scene_motion: opts
                .analyze_motion
                .then(|| analyses.iter().map(|a| a.motion.clone()).collect()),
            scene_continuity: opts
                .analyze_continuity
                .then(|| analyses.iter().map(|a| a.continuity).collect()),
            scene_quality: wants_analysis.then(|| analyses.iter().map(|a| a.quality).collect()),
            scene_importance: wants_analysis
                .then(|| analyses.iter().map(|a| a.importance).collect()),
            keyframes,
        })
    }
}
