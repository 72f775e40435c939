//! Per-frame detector output consumed by the trackers

use crate::bbox::Bbox;
use serde::{Deserialize, Serialize};

/// One raw detection: a box, a class and a confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: Bbox,
    /// Detector confidence in [0, 1]
    pub confidence: f32,
    pub class_id: u32,
    pub class_name: String,
    /// Index of the frame this detection belongs to, stamped by the pipeline
    #[serde(default)]
    pub frame_index: u64,
}

impl Detection {
    pub fn new(bbox: Bbox, confidence: f32, class_id: u32, class_name: impl Into<String>) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            class_name: class_name.into(),
            frame_index: 0,
        }
    }

    pub fn with_frame_index(mut self, frame_index: u64) -> Self {
        self.frame_index = frame_index;
        self
    }
}
