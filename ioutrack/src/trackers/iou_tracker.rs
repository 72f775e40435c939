//! IoU multi-object tracker
//!
//! Each `update` call is one frame:
//! 1. associate detections with tracks (greedy or optimal)
//! 2. matched tracks absorb their detection, unmatched detections open new tracks
//! 3. every track not claimed this frame ages by one
//! 4. tracks older than `max_age` are dropped
//! 5. tracks with at least `min_hits` hits are returned

use super::Association;
use crate::bbox::{calculate_iou, ious, Bbox};
use crate::detection::Detection;
use crate::hungarian::HungarianSolver;
use crate::track::{Track, TrackSnapshot, DEFAULT_HISTORY_LEN};
use std::collections::{BTreeMap, HashSet};

/// Number of trailing history entries exposed per confirmed track
pub const DEFAULT_EXPOSED_HISTORY: usize = 10;

#[derive(Debug, Clone)]
pub struct IouMultiTracker {
    pub max_age: u32,
    pub min_hits: u32,
    pub iou_threshold: f32,
    pub association: Association,
    history_len: usize,
    exposed_history: usize,
    next_track_id: u32,
    pub tracklets: BTreeMap<u32, Track>,
    /// number of frames processed so far
    pub n_steps: u64,
}

impl IouMultiTracker {
    pub fn new(max_age: u32, min_hits: u32, iou_threshold: f32) -> Self {
        IouMultiTracker {
            max_age,
            min_hits,
            iou_threshold,
            association: Association::default(),
            history_len: DEFAULT_HISTORY_LEN,
            exposed_history: DEFAULT_EXPOSED_HISTORY,
            next_track_id: 1,
            tracklets: BTreeMap::new(),
            n_steps: 0,
        }
    }

    pub fn with_association(mut self, association: Association) -> Self {
        self.association = association;
        self
    }

    /// Set the per-track history buffer size and how much of it is exposed
    pub fn with_history(mut self, history_len: usize, exposed_history: usize) -> Self {
        self.history_len = history_len.max(1);
        self.exposed_history = exposed_history;
        self
    }

    /// Index the next `update` call will assign to its frame (1-based)
    pub fn next_frame_index(&self) -> u64 {
        self.n_steps + 1
    }

    /// Greedy association: each detection, in input order, takes the unclaimed
    /// track with the highest IoU if that IoU clears the threshold.
    ///
    /// Not globally optimal when detections compete for overlapping tracks.
    fn associate_greedy(&self, detections: &[Detection]) -> Vec<Option<u32>> {
        let mut claimed: HashSet<u32> = HashSet::with_capacity(detections.len());

        detections
            .iter()
            .map(|det| {
                let mut best_iou = 0.0_f32;
                let mut best_track = None;

                for (track_id, tracklet) in &self.tracklets {
                    if claimed.contains(track_id) {
                        continue;
                    }
                    let iou = calculate_iou(&det.bbox, &tracklet.bbox);
                    if iou > best_iou {
                        best_iou = iou;
                        best_track = Some(*track_id);
                    }
                }

                match best_track {
                    Some(track_id) if best_iou > self.iou_threshold => {
                        log::debug!(
                            "Detection {} -> track {} (IoU={:.3})",
                            det.bbox,
                            track_id,
                            best_iou
                        );
                        claimed.insert(track_id);
                        Some(track_id)
                    }
                    _ => None,
                }
            })
            .collect()
    }

    /// Optimal association over the whole frame via the Hungarian algorithm
    fn associate_optimal(&self, detections: &[Detection]) -> Vec<Option<u32>> {
        let track_ids: Vec<u32> = self.tracklets.keys().copied().collect();
        let track_boxes: Vec<Bbox> = self.tracklets.values().map(|t| t.bbox).collect();
        let det_boxes: Vec<Bbox> = detections.iter().map(|d| d.bbox).collect();

        let det_track_ious = ious(&det_boxes, &track_boxes);
        let result = HungarianSolver::solve_iou(det_track_ious.view(), self.iou_threshold);

        let mut matches = vec![None; detections.len()];
        for (det_idx, track_idx) in result.assignments {
            matches[det_idx] = Some(track_ids[track_idx]);
        }
        matches
    }

    fn create_tracklet(&mut self, detection: Detection, frame_index: u64) -> u32 {
        let track_id = self.next_track_id;
        self.next_track_id = self.next_track_id.wrapping_add(1).max(1);
        self.tracklets.insert(
            track_id,
            Track::new(track_id, detection, frame_index, self.history_len),
        );
        track_id
    }

    /// Remove tracks that exceeded `max_age`
    pub fn remove_stale_tracklets(&mut self) {
        let max_age = self.max_age;
        self.tracklets.retain(|track_id, tracklet| {
            let keep = tracklet.age <= max_age;
            if !keep {
                log::debug!("Track {} removed after {} missed frames", track_id, tracklet.age);
            }
            keep
        });
    }

    /// Snapshots of all tracks that have reached `min_hits`, ordered by id
    pub fn confirmed_tracks(&self) -> Vec<TrackSnapshot> {
        self.tracklets
            .values()
            .filter(|t| t.is_confirmed(self.min_hits))
            .map(|t| t.snapshot(self.exposed_history))
            .collect()
    }

    /// Advance one frame with this frame's detections.
    ///
    /// An empty slice ages every track, which is how dropped frames are
    /// accounted for.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackSnapshot> {
        self.n_steps += 1;
        let frame_index = self.n_steps;

        let matches = match self.association {
            Association::Greedy => self.associate_greedy(detections),
            Association::Optimal => self.associate_optimal(detections),
        };

        let mut claimed: HashSet<u32> = HashSet::with_capacity(detections.len());
        for (detection, matched) in detections.iter().zip(matches) {
            let detection = detection.clone().with_frame_index(frame_index);
            let existing = matched.filter(|id| self.tracklets.contains_key(id));
            let track_id = match existing {
                Some(id) => {
                    if let Some(tracklet) = self.tracklets.get_mut(&id) {
                        tracklet.mark_matched(detection, frame_index);
                    }
                    id
                }
                None => self.create_tracklet(detection, frame_index),
            };
            claimed.insert(track_id);
        }

        for (track_id, tracklet) in self.tracklets.iter_mut() {
            if !claimed.contains(track_id) {
                tracklet.mark_missed();
            }
        }

        self.remove_stale_tracklets();
        self.confirmed_tracks()
    }

    /// Number of tracks currently held, confirmed or not
    pub fn num_tracklets(&self) -> usize {
        self.tracklets.len()
    }

    pub fn get(&self, track_id: u32) -> Option<&Track> {
        self.tracklets.get(&track_id)
    }

    /// Clear all tracks; ids keep increasing
    pub fn clear_trackers(&mut self) {
        self.tracklets.clear();
    }

    pub fn remove_tracker(&mut self, track_id: u32) {
        self.tracklets.remove(&track_id);
    }
}
