/// Detector collaborator interface
///
/// The pipeline works with any object detector (a local model, a remote
/// inference service, a replay of recorded output) as long as it implements
/// this trait. Detectors run on the stream worker threads, so they must be
/// shareable across threads.
use crate::types::Detection;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Thresholds handed to the detector with every frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Minimum confidence a detection needs to be kept (0-1)
    pub confidence_threshold: f32,
    /// Non-maximum suppression threshold used inside the detector (0-1)
    pub iou_threshold: f32,
    /// Maximum number of detections per frame
    pub max_detections: usize,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.4,
            max_detections: 100,
        }
    }
}

/// Common interface for object detectors
///
/// Detections are returned in the pixel coordinates of `frame`. Implementations
/// are not required to honour `params`; the pipeline re-applies them.
pub trait Detector: Send + Sync {
    /// Detect objects in a single frame
    fn detect(&self, frame: &RgbImage, params: &DetectionParams) -> Result<Vec<Detection>, String>;

    /// Get the detector name (for logging/debugging)
    fn name(&self) -> &str;

    /// A frame reached the stream but never got to `detect` (it could not be
    /// decoded). Detectors that track frame position catch up here.
    fn skip_frame(&self) {}
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&self, frame: &RgbImage, params: &DetectionParams) -> Result<Vec<Detection>, String> {
        (**self).detect(frame, params)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn skip_frame(&self) {
        (**self).skip_frame()
    }
}
