//! Detector that replays recorded per-frame output
//!
//! The replay file is a JSON array with one entry per frame, each entry an
//! array of detections:
//!
//! ```json
//! [
//!   [{"bbox": [10, 10, 50, 50], "confidence": 0.9, "class_id": 0, "class_name": "can"}],
//!   []
//! ]
//! ```

use crate::detector_trait::{DetectionParams, Detector};
use crate::error::Result;
use crate::types::Detection;
use image::RgbImage;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

pub struct ReplayDetector {
    frames: Mutex<VecDeque<Vec<Detection>>>,
}

impl ReplayDetector {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let frames: Vec<Vec<Detection>> = serde_json::from_str(raw)?;
        Ok(Self::new(frames))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let detector = Self::from_json(&fs::read_to_string(path)?)?;
        log::info!(
            "Loaded {} recorded frames from {}",
            detector.remaining(),
            path.display()
        );
        Ok(detector)
    }

    /// Recorded frames not yet replayed
    pub fn remaining(&self) -> usize {
        self.frames
            .lock()
            .map(|frames| frames.len())
            .unwrap_or_default()
    }
}

impl Detector for ReplayDetector {
    fn detect(&self, _frame: &RgbImage, _params: &DetectionParams) -> std::result::Result<Vec<Detection>, String> {
        let mut frames = self
            .frames
            .lock()
            .map_err(|_| "replay queue poisoned".to_string())?;
        // Exhausted recordings behave like empty frames
        Ok(frames.pop_front().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "replay"
    }

    /// Drop the recording of a frame that was never detected on, so later
    /// frames stay aligned with their own entries
    fn skip_frame(&self) {
        if let Ok(mut frames) = self.frames.lock() {
            if frames.pop_front().is_some() {
                log::debug!("Skipped recorded frame, {} remaining", frames.len());
            }
        }
    }
}
