//! Job parameters.
//!
//! A job is either an analysis pass or a full process (analyze, select, grade,
//! join, render). The two carry different option sets and are validated at
//! intake, before a job record exists.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ModelError, ModelResult};

/// Maximum number of keyframes an analysis job may request.
pub const MAX_KEYFRAMES: usize = 20;

/// What a job does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Segment and score only; no output file.
    Analyze(AnalyzeOptions),
    /// Segment, score, select, grade, join and render.
    Process(ProcessOptions),
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Analyze(_) => "analyze",
            JobKind::Process(_) => "process",
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        match self {
            JobKind::Analyze(opts) => opts.validate(),
            JobKind::Process(opts) => opts.validate(),
        }
    }
}

/// Options for a full processing job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProcessOptions {
    /// Style preset id (cinematic, vibrant, muted)
    pub style: String,
    /// Blend of the styled frame over the original, 0-1
    pub strength: f64,
    /// Join mode between kept scenes
    pub transition: String,
    pub optimize_scenes: bool,
    pub analyze_content: bool,
    /// Include per-scene motion samples in the result
    pub analyze_motion: bool,
    /// Include per-scene continuity metrics in the result
    pub analyze_continuity: bool,
    pub min_quality: f64,
    pub min_importance: f64,
    pub min_object_continuity: f64,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            style: "cinematic".to_string(),
            strength: 0.5,
            transition: "fade".to_string(),
            optimize_scenes: true,
            analyze_content: true,
            analyze_motion: true,
            analyze_continuity: true,
            min_quality: 0.6,
            min_importance: 0.4,
            min_object_continuity: 0.5,
        }
    }
}

impl ProcessOptions {
    pub fn validate(&self) -> ModelResult<()> {
        check_unit("strength", self.strength)?;
        check_unit("min_quality", self.min_quality)?;
        check_unit("min_importance", self.min_importance)?;
        check_unit("min_object_continuity", self.min_object_continuity)?;

        if self.style.trim().is_empty() {
            return Err(ModelError::invalid_option("style", "must not be empty"));
        }
        if self.transition.trim().is_empty() {
            return Err(ModelError::invalid_option("transition", "must not be empty"));
        }
        Ok(())
    }

    pub fn transition_kind(&self) -> TransitionKind {
        TransitionKind::parse(&self.transition)
    }
}

/// Options for an analysis-only job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalyzeOptions {
    pub analyze_content: bool,
    pub analyze_motion: bool,
    pub analyze_continuity: bool,
    /// Number of representative frames to pick (1-20)
    pub num_keyframes: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            analyze_content: true,
            analyze_motion: true,
            analyze_continuity: true,
            num_keyframes: 5,
        }
    }
}

impl AnalyzeOptions {
    pub fn validate(&self) -> ModelResult<()> {
        if self.num_keyframes == 0 || self.num_keyframes > MAX_KEYFRAMES {
            return Err(ModelError::invalid_option(
                "num_keyframes",
                format!("must be between 1 and {MAX_KEYFRAMES}, got {}", self.num_keyframes),
            ));
        }
        Ok(())
    }
}

fn check_unit(field: &'static str, value: f64) -> ModelResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ModelError::invalid_option(
            field,
            format!("must be within [0, 1], got {value}"),
        ));
    }
    Ok(())
}

/// How kept scenes are joined.
///
/// Only `fade` has a compositing implementation. Any other identifier is
/// accepted and rendered as a straight cut; the assembler logs when that
/// happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionKind {
    Fade,
    Cut,
    /// Accepted but unimplemented; rendered as a cut.
    Other(String),
}

impl TransitionKind {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "fade" => TransitionKind::Fade,
            "cut" | "none" => TransitionKind::Cut,
            other => TransitionKind::Other(other.to_string()),
        }
    }

    /// Whether joins get a fade.
    pub fn is_fade(&self) -> bool {
        matches!(self, TransitionKind::Fade)
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionKind::Fade => write!(f, "fade"),
            TransitionKind::Cut => write!(f, "cut"),
            TransitionKind::Other(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_defaults_are_valid() {
        let opts = ProcessOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.transition_kind(), TransitionKind::Fade);
    }

    #[test]
    fn test_process_rejects_out_of_range() {
        let opts = ProcessOptions {
            strength: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            opts.validate(),
            Err(ModelError::InvalidOption { field: "strength", .. })
        ));

        let opts = ProcessOptions {
            min_quality: -0.1,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_analyze_keyframe_bounds() {
        assert!(AnalyzeOptions::default().validate().is_ok());
        for bad in [0, 21] {
            let opts = AnalyzeOptions {
                num_keyframes: bad,
                ..Default::default()
            };
            assert!(opts.validate().is_err());
        }
    }

    #[test]
    fn test_transition_parse() {
        assert_eq!(TransitionKind::parse("Fade"), TransitionKind::Fade);
        assert_eq!(TransitionKind::parse("cut"), TransitionKind::Cut);
        assert_eq!(
            TransitionKind::parse("wipe"),
            TransitionKind::Other("wipe".to_string())
        );
        assert!(!TransitionKind::parse("wipe").is_fade());
    }

    #[test]
    fn test_job_kind_tagged_serde() {
        let kind = JobKind::Process(ProcessOptions {
            optimize_scenes: false,
            ..Default::default()
        });
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "process");
        assert_eq!(json["optimize_scenes"], false);

        let parsed: JobKind =
            serde_json::from_str(r#"{"kind":"analyze","num_keyframes":3}"#).unwrap();
        match parsed {
            JobKind::Analyze(opts) => {
                assert_eq!(opts.num_keyframes, 3);
                assert!(opts.analyze_content);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }
}
