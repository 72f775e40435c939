//! Multi-object tracking implementations
//!
//! `IouMultiTracker` links per-frame detections into persistent tracks by box
//! overlap alone (no motion model). Association is greedy in detection order
//! by default; optimal (Hungarian) assignment is available as an opt-in.

use serde::{Deserialize, Serialize};
use std::fmt;

mod iou_tracker;

pub use iou_tracker::IouMultiTracker;

/// Strategy for pairing detections with existing tracks within one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Association {
    /// Detections claim their best unclaimed track in input order
    #[default]
    Greedy,
    /// Maximise total IoU over the frame with the Hungarian algorithm
    Optimal,
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Greedy => write!(f, "greedy"),
            Self::Optimal => write!(f, "optimal"),
        }
    }
}
