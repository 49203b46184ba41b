//! Scenes, object tracks and per-frame motion samples.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{BoundingBox, ModelError, ModelResult};

/// A half-open time interval `[start_time, end_time)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    pub start_time: f64,
    pub end_time: f64,
}

impl Scene {
    /// Create a scene, rejecting empty, inverted or negative intervals.
    pub fn new(start_time: f64, end_time: f64) -> ModelResult<Self> {
        if !(start_time >= 0.0 && end_time > start_time) {
            return Err(ModelError::InvalidScene {
                start: start_time,
                end: end_time,
            });
        }
        Ok(Self {
            start_time,
            end_time,
        })
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_time && t < self.end_time
    }
}

/// A temporally linked sequence of object positions.
///
/// Ids are scoped to one tracking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Track {
    pub track_id: u32,
    /// Last associated box, used for IoU matching.
    pub last_bbox: BoundingBox,
    /// `(frame_index, cx, cy)` per associated frame, in frame order.
    pub positions: Vec<(u64, f64, f64)>,
}

impl Track {
    pub fn new(track_id: u32, frame_index: u64, bbox: BoundingBox) -> Self {
        Self {
            track_id,
            last_bbox: bbox,
            positions: vec![(frame_index, bbox.cx(), bbox.cy())],
        }
    }

    pub fn push(&mut self, frame_index: u64, bbox: BoundingBox) {
        self.last_bbox = bbox;
        self.positions.push((frame_index, bbox.cx(), bbox.cy()));
    }
}

/// Motion statistics for one frame of a tracking pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct MotionSample {
    /// Motion complexity (variance of step magnitudes), >= 0
    pub magnitude: f64,
    /// Normalized smoothness in [0, 1]
    pub direction: f64,
    /// Object interaction, >= 0
    pub variance: f64,
    pub num_objects: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_validation() {
        assert!(Scene::new(0.0, 5.0).is_ok());
        assert!(Scene::new(5.0, 5.0).is_err());
        assert!(Scene::new(-1.0, 5.0).is_err());
        assert!(Scene::new(f64::NAN, 5.0).is_err());
    }

    #[test]
    fn test_scene_contains_half_open() {
        let scene = Scene::new(2.0, 4.0).unwrap();
        assert!(scene.contains(2.0));
        assert!(scene.contains(3.999));
        assert!(!scene.contains(4.0));
        assert_eq!(scene.duration(), 2.0);
    }

    #[test]
    fn test_track_push_records_centers() {
        let mut track = Track::new(0, 0, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        track.push(1, BoundingBox::new(2.0, 0.0, 10.0, 10.0));
        assert_eq!(track.positions, vec![(0, 5.0, 5.0), (1, 7.0, 5.0)]);
        assert_eq!(track.last_bbox.x, 2.0);
    }
}
