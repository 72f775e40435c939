//! Type definitions shared across the analytics pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use ioutrack::{Bbox, Detection, TrackSnapshot};

/// RGB colour triple
pub type Color = [u8; 3];

/// Tag identifying how a brand detection was produced
pub const COLOR_ANALYSIS: &str = "color_analysis";

/// Brand/sponsor signal found inside a detected object's region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandDetection {
    pub brand: String,
    /// Best colour similarity in [0, 1]
    pub confidence: f32,
    pub bbox: Bbox,
    pub detection_method: String,
    /// Class of the object the region was cropped from
    pub object_type: String,
}

/// Frame geometry and timing attached to every result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Width after resizing
    pub width: u32,
    /// Height after resizing
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
    /// Wall-clock processing time in seconds
    pub processing_time: f64,
}

impl FrameInfo {
    pub fn was_resized(&self) -> bool {
        self.width != self.original_width || self.height != self.original_height
    }
}

/// Everything produced for one processed frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameResult {
    pub stream_id: String,
    /// Generation of the session that produced the frame; a restarted stream
    /// gets a new one
    #[serde(default)]
    pub session: u64,
    /// 1-based index of the frame within its stream
    pub frame_index: u64,
    pub detections: Vec<Detection>,
    pub tracked_objects: Vec<TrackSnapshot>,
    pub brand_detections: Vec<BrandDetection>,
    pub frame_info: FrameInfo,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Stopped,
}

/// Snapshot of one admitted stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSession {
    pub stream_id: String,
    /// Opaque source tag (webcam, rtsp, upload, ...)
    pub source_type: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// Frames run through the pipeline so far
    pub frame_count: u64,
}
