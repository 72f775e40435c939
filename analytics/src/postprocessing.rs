//! Validation of detector output before it reaches the tracker

use crate::detector_trait::DetectionParams;
use crate::types::Detection;

/// Filters raw detector output down to detections the tracker can trust
pub struct Postprocessor {
    /// Confidence threshold for filtering detections
    confidence_threshold: f32,
    /// Maximum number of detections to return
    max_detections: usize,
}

/// Outcome of one sanitising pass
#[derive(Debug, Default)]
pub struct Sanitized {
    pub detections: Vec<Detection>,
    pub below_confidence: usize,
    pub degenerate: usize,
    pub truncated: usize,
}

impl Postprocessor {
    pub fn new(params: &DetectionParams) -> Self {
        Self {
            confidence_threshold: params.confidence_threshold,
            max_detections: params.max_detections,
        }
    }

    /// Apply confidence filtering, box validation, clipping to the frame and
    /// the detection cap. Relative order of surviving detections is kept.
    pub fn process(&self, raw: Vec<Detection>, frame_width: u32, frame_height: u32) -> Sanitized {
        let mut out = Sanitized::default();
        let (w, h) = (frame_width as f32, frame_height as f32);

        for mut det in raw {
            if !det.confidence.is_finite() || det.confidence < self.confidence_threshold {
                out.below_confidence += 1;
                continue;
            }
            if !det.bbox.is_valid() {
                out.degenerate += 1;
                continue;
            }
            det.bbox = det.bbox.clip(w, h);
            // Boxes entirely outside the frame collapse when clipped
            if !det.bbox.is_valid() {
                out.degenerate += 1;
                continue;
            }
            det.confidence = det.confidence.min(1.0);
            out.detections.push(det);
        }

        out.truncated = self.limit_detections(&mut out.detections);
        out
    }

    /// Keep the `max_detections` most confident detections, in input order
    fn limit_detections(&self, detections: &mut Vec<Detection>) -> usize {
        let excess = detections.len().saturating_sub(self.max_detections);
        if excess == 0 {
            return 0;
        }

        let mut ranked: Vec<usize> = (0..detections.len()).collect();
        ranked.sort_by(|&a, &b| {
            detections[b]
                .confidence
                .total_cmp(&detections[a].confidence)
                .then(a.cmp(&b))
        });
        let mut keep = vec![false; detections.len()];
        for &idx in ranked.iter().take(self.max_detections) {
            keep[idx] = true;
        }

        let mut idx = 0;
        detections.retain(|_| {
            let kept = keep[idx];
            idx += 1;
            kept
        });
        excess
    }
}
