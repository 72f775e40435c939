//! Single tracked object: identity, lifecycle counters and bounded history

use crate::bbox::Bbox;
use crate::detection::Detection;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of associated detections retained per track
pub const DEFAULT_HISTORY_LEN: usize = 30;

/// Lifecycle state of a track, derived from its counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Matched this frame, not yet seen `min_hits` times
    Provisional,
    /// Matched this frame and seen at least `min_hits` times
    Confirmed,
    /// Missed at least the latest frame but still within `max_age`
    Stale,
    /// Missed more than `max_age` consecutive frames
    Removed,
}

#[derive(Debug, Clone)]
pub struct Track {
    /// track id, unique within the owning tracker
    pub id: u32,
    pub bbox: Bbox,
    pub class_name: String,
    pub confidence: f32,
    pub first_seen: u64,
    pub last_seen: u64,
    /// number of frames with a matching detection (starts at 1)
    pub hits: u32,
    /// number of consecutive frames without a match
    pub age: u32,
    history: VecDeque<Detection>,
    history_len: usize,
}

impl Track {
    /// Create a track from the detection that started it
    pub fn new(id: u32, detection: Detection, frame_index: u64, history_len: usize) -> Self {
        let history_len = history_len.max(1);
        let mut history = VecDeque::with_capacity(history_len);
        let bbox = detection.bbox;
        let class_name = detection.class_name.clone();
        let confidence = detection.confidence;
        history.push_back(detection);

        Self {
            id,
            bbox,
            class_name,
            confidence,
            first_seen: frame_index,
            last_seen: frame_index,
            hits: 1,
            age: 0,
            history,
            history_len,
        }
    }

    /// Associate a detection with this track on `frame_index`
    pub fn mark_matched(&mut self, detection: Detection, frame_index: u64) {
        self.bbox = detection.bbox;
        self.confidence = detection.confidence;
        self.last_seen = frame_index;
        self.hits = self.hits.saturating_add(1);
        self.age = 0;

        if self.history.len() == self.history_len {
            self.history.pop_front();
        }
        self.history.push_back(detection);
    }

    /// Record a frame in which nothing matched this track
    pub fn mark_missed(&mut self) {
        self.age = self.age.saturating_add(1);
    }

    pub fn is_confirmed(&self, min_hits: u32) -> bool {
        self.hits >= min_hits
    }

    pub fn state(&self, min_hits: u32, max_age: u32) -> TrackState {
        if self.age > max_age {
            TrackState::Removed
        } else if self.age > 0 {
            TrackState::Stale
        } else if self.is_confirmed(min_hits) {
            TrackState::Confirmed
        } else {
            TrackState::Provisional
        }
    }

    /// Associated detections, oldest first
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &Detection> + ExactSizeIterator {
        self.history.iter()
    }

    /// Externally visible view with at most `recent` trailing history entries
    pub fn snapshot(&self, recent: usize) -> TrackSnapshot {
        let skip = self.history.len().saturating_sub(recent);
        TrackSnapshot {
            id: self.id,
            bbox: self.bbox,
            class_name: self.class_name.clone(),
            confidence: self.confidence,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            hits: self.hits,
            trajectory: self.history.iter().skip(skip).cloned().collect(),
        }
    }
}

/// Confirmed track as handed to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: u32,
    pub bbox: Bbox,
    pub class_name: String,
    pub confidence: f32,
    pub first_seen: u64,
    pub last_seen: u64,
    pub hits: u32,
    pub trajectory: Vec<Detection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32) -> Detection {
        Detection::new(Bbox::new(x, 0.0, x + 10.0, 10.0), 0.9, 39, "bottle")
    }

    #[test]
    fn test_new_track_counters() {
        let track = Track::new(7, det(0.0), 4, DEFAULT_HISTORY_LEN);
        assert_eq!(track.id, 7);
        assert_eq!(track.hits, 1);
        assert_eq!(track.age, 0);
        assert_eq!(track.first_seen, 4);
        assert_eq!(track.last_seen, 4);
        assert_eq!(track.history().len(), 1);
        assert_eq!(track.state(3, 30), TrackState::Provisional);
    }

    #[test]
    fn test_match_resets_age_and_counts_hits() {
        let mut track = Track::new(1, det(0.0), 1, DEFAULT_HISTORY_LEN);
        track.mark_missed();
        track.mark_missed();
        assert_eq!(track.age, 2);
        assert_eq!(track.state(3, 30), TrackState::Stale);

        track.mark_matched(det(1.0), 4);
        assert_eq!(track.age, 0);
        assert_eq!(track.hits, 2);
        assert_eq!(track.last_seen, 4);
        assert_eq!(track.bbox, Bbox::new(1.0, 0.0, 11.0, 10.0));

        track.mark_matched(det(2.0), 5);
        assert_eq!(track.hits, 3);
        assert_eq!(track.state(3, 30), TrackState::Confirmed);
    }

    #[test]
    fn test_removed_state_after_max_age() {
        let mut track = Track::new(1, det(0.0), 1, DEFAULT_HISTORY_LEN);
        for _ in 0..3 {
            track.mark_missed();
        }
        assert_eq!(track.state(3, 3), TrackState::Stale);
        track.mark_missed();
        assert_eq!(track.state(3, 3), TrackState::Removed);
    }

    #[test]
    fn test_history_is_bounded_oldest_evicted() {
        let mut track = Track::new(1, det(0.0), 1, 30);
        for i in 1..40 {
            track.mark_matched(det(i as f32), i as u64 + 1);
        }
        assert_eq!(track.history().len(), 30);
        assert_eq!(track.history().next().unwrap().bbox.xmin, 9.0);
        assert_eq!(track.history().last().unwrap().bbox.xmin, 39.0);
    }

    #[test]
    fn test_snapshot_exposes_recent_history() {
        let mut track = Track::new(1, det(0.0), 1, 30);
        for i in 1..15 {
            track.mark_matched(det(i as f32), i as u64 + 1);
        }
        let snap = track.snapshot(10);
        assert_eq!(snap.trajectory.len(), 10);
        assert_eq!(snap.trajectory[0].bbox.xmin, 5.0);
        assert_eq!(snap.trajectory[9].bbox.xmin, 14.0);
        assert_eq!(snap.hits, 15);

        let short = Track::new(2, det(0.0), 1, 30).snapshot(10);
        assert_eq!(short.trajectory.len(), 1);
    }
}
