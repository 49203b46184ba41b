//! IoU object tracking and motion statistics.
//!
//! Tracks live in an id-ordered map for the length of one scene's tracking
//! pass. Each frame, every detection is offered to the active tracks in id
//! order and joins the first one it overlaps with IoU above the threshold.
//! The first match wins even if a later track overlaps more. A track takes
//! at most one position per frame; further detections matching it are
//! absorbed. Detections that match nothing start a new track with the next
//! id. A track that no detection matched in a frame is dropped and never
//! revived.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use vedit_models::{Detection, MotionSample, Scene, Track};

use crate::error::MediaResult;
use crate::frame::{FrameSpan, Video};
use crate::stats::{diff, mean, variance};
use crate::vision::VisionModels;

/// Distance scale for the interaction score, in pixels.
const INTERACTION_SCALE: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct ObjectTracker {
    iou_threshold: f64,
    tracks: BTreeMap<u32, Track>,
    next_id: u32,
}

impl ObjectTracker {
    pub fn new(iou_threshold: f64) -> Self {
        Self {
            iou_threshold,
            tracks: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Associate one frame's detections and return the surviving tracks.
    pub fn update(&mut self, frame_index: u64, detections: &[Detection]) -> Vec<&Track> {
        let mut updated: HashSet<u32> = HashSet::new();

        for detection in detections {
            let matched = self
                .tracks
                .iter()
                .find(|(_, track)| track.last_bbox.iou(&detection.bbox) > self.iou_threshold)
                .map(|(id, _)| *id);

            match matched {
                Some(id) => {
                    if updated.insert(id) {
                        if let Some(track) = self.tracks.get_mut(&id) {
                            track.push(frame_index, detection.bbox);
                        }
                    }
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks
                        .insert(id, Track::new(id, frame_index, detection.bbox));
                    updated.insert(id);
                }
            }
        }

        let before = self.tracks.len();
        self.tracks.retain(|id, _| updated.contains(id));
        if self.tracks.len() < before {
            debug!(
                dropped = before - self.tracks.len(),
                frame_index,
                "Dropping unmatched tracks"
            );
        }

        self.tracks.values().collect()
    }

    pub fn active_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }
}

/// Motion statistics over a set of tracks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionPatterns {
    pub motion_complexity: f64,
    pub motion_smoothness: f64,
    pub object_interaction: f64,
}

/// Complexity, smoothness and interaction of a track set.
///
/// All three are 0 when no track has moved yet (fewer than two positions).
pub fn motion_patterns(tracks: &[&Track]) -> MotionPatterns {
    let vectors: Vec<(f64, f64)> = tracks
        .iter()
        .flat_map(|track| {
            track
                .positions
                .windows(2)
                .map(|w| (w[1].1 - w[0].1, w[1].2 - w[0].2))
        })
        .collect();

    if vectors.is_empty() {
        return MotionPatterns::default();
    }

    let magnitudes: Vec<f64> = vectors.iter().map(|(dx, dy)| dx.hypot(*dy)).collect();
    let angles: Vec<f64> = vectors.iter().map(|(dx, dy)| dy.atan2(*dx)).collect();

    MotionPatterns {
        motion_complexity: variance(&magnitudes),
        motion_smoothness: 1.0 / (1.0 + variance(&diff(&angles))),
        object_interaction: object_interaction(tracks),
    }
}

/// Mean over unordered track pairs of `1 / (1 + d / 100)`, where `d` is the
/// closest distance between the pair's centres on frames both were seen.
/// Pairs never seen together contribute 0. Fewer than two tracks give 0.
pub fn object_interaction(tracks: &[&Track]) -> f64 {
    if tracks.len() < 2 {
        return 0.0;
    }

    let mut interactions = Vec::new();
    for (i, a) in tracks.iter().enumerate() {
        for b in &tracks[i + 1..] {
            let by_frame: BTreeMap<u64, (f64, f64)> =
                b.positions.iter().map(|(f, x, y)| (*f, (*x, *y))).collect();
            let min_dist = a
                .positions
                .iter()
                .filter_map(|(f, x, y)| {
                    by_frame
                        .get(f)
                        .map(|(bx, by)| (x - bx).hypot(y - by))
                })
                .fold(f64::INFINITY, f64::min);
            interactions.push(1.0 / (1.0 + min_dist / INTERACTION_SCALE));
        }
    }
    mean(&interactions)
}

/// Run detection and tracking over every frame of a scene.
///
/// Returns one sample per frame, or nothing for scenes shorter than two frames.
pub async fn track_scene(
    video: &dyn Video,
    scene: &Scene,
    models: &VisionModels,
    iou_threshold: f64,
) -> MediaResult<Vec<MotionSample>> {
    let span = FrameSpan::scene(scene);
    let (first, end) = span.frame_range(video.info());
    if end.saturating_sub(first) < 2 {
        return Ok(Vec::new());
    }

    let mut tracker = ObjectTracker::new(iou_threshold);
    let mut reader = video.read(span).await?;
    let mut samples = Vec::with_capacity((end - first) as usize);

    while let Some(frame) = reader.next_frame().await? {
        let detections = models.detect(&frame.image).await?;
        let active = tracker.update(frame.index, &detections);
        let patterns = motion_patterns(&active);
        samples.push(MotionSample {
            magnitude: patterns.motion_complexity,
            direction: patterns.motion_smoothness,
            variance: patterns.object_interaction,
            num_objects: active.len(),
        });
    }

    if samples.len() < 2 {
        return Ok(Vec::new());
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vedit_models::BoundingBox;

    fn det(x: f64, y: f64) -> Detection {
        Detection::new(BoundingBox::new(x, y, 10.0, 10.0), 0.9, 0)
    }

    #[test]
    fn test_new_detections_get_monotonic_ids() {
        let mut tracker = ObjectTracker::new(0.3);
        let ids: Vec<u32> = tracker
            .update(0, &[det(0.0, 0.0), det(100.0, 100.0)])
            .iter()
            .map(|t| t.track_id)
            .collect();
        assert_eq!(ids, vec![0, 1]);

        // Track 0 vanishes, track 1 moves, a new object appears.
        let ids: Vec<u32> = tracker
            .update(1, &[det(101.0, 100.0), det(300.0, 300.0)])
            .iter()
            .map(|t| t.track_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_dropped_track_is_not_revived() {
        let mut tracker = ObjectTracker::new(0.3);
        tracker.update(0, &[det(0.0, 0.0)]);
        tracker.update(1, &[]);
        assert_eq!(tracker.active_tracks().count(), 0);
        let tracks = tracker.update(2, &[det(0.0, 0.0)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_id, 1);
        assert_eq!(tracks[0].positions.len(), 1);
    }

    #[test]
    fn test_overlapping_detection_is_absorbed() {
        let mut tracker = ObjectTracker::new(0.1);
        // IoU of the two boxes is 0.43, so the second joins the first track.
        let tracks = tracker.update(0, &[det(0.0, 0.0), det(4.0, 0.0)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].positions.len(), 1);
    }

    #[test]
    fn test_first_match_wins_in_id_order() {
        let mut tracker = ObjectTracker::new(0.2);
        // IoU 0.11, below the threshold: two tracks.
        assert_eq!(tracker.update(0, &[det(0.0, 0.0), det(8.0, 0.0)]).len(), 2);

        // Overlaps track 0 with IoU 0.33 and track 1 with IoU 0.54.
        let tracks = tracker.update(1, &[det(5.0, 0.0)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_id, 0);
        assert_eq!(tracks[0].positions, vec![(0, 5.0, 5.0), (1, 10.0, 5.0)]);
    }

    #[test]
    fn test_motion_patterns_empty_and_static() {
        assert_eq!(motion_patterns(&[]), MotionPatterns::default());

        let track = Track::new(0, 0, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(motion_patterns(&[&track]), MotionPatterns::default());
    }

    #[test]
    fn test_constant_velocity_is_smooth() {
        let mut track = Track::new(0, 0, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        for i in 1..5 {
            track.push(i, BoundingBox::new(i as f64 * 3.0, 0.0, 10.0, 10.0));
        }
        let p = motion_patterns(&[&track]);
        assert_eq!(p.motion_complexity, 0.0);
        assert_eq!(p.motion_smoothness, 1.0);
        assert_eq!(p.object_interaction, 0.0);
    }

    #[test]
    fn test_interaction_uses_shared_frames() {
        let mut a = Track::new(0, 0, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        a.push(1, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        let mut b = Track::new(1, 0, BoundingBox::new(100.0, 0.0, 10.0, 10.0));
        b.push(1, BoundingBox::new(50.0, 0.0, 10.0, 10.0));
        // Closest approach 50px -> 1 / 1.5
        assert!((object_interaction(&[&a, &b]) - 1.0 / 1.5).abs() < 1e-12);

        let c = Track::new(2, 7, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(object_interaction(&[&a, &c]), 0.0);
        assert_eq!(object_interaction(&[&a]), 0.0);
    }
}
