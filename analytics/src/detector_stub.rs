//! Fixed-output detector for tests and smoke runs

use crate::detector_trait::{DetectionParams, Detector};
use crate::types::Detection;
use image::RgbImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Returns the same detections for every frame
///
/// Can be switched into a failing mode to exercise the detector-unavailable
/// path.
#[derive(Debug, Default)]
pub struct StubDetector {
    detections: Vec<Detection>,
    failing: AtomicBool,
    calls: AtomicU64,
}

impl StubDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        log::info!("Creating stub detector ({} fixed detections)", detections.len());
        Self {
            detections,
            failing: AtomicBool::new(false),
            calls: AtomicU64::new(0),
        }
    }

    /// Detector that never finds anything
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `detect` calls so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for StubDetector {
    fn detect(&self, _frame: &RgbImage, _params: &DetectionParams) -> Result<Vec<Detection>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err("stub detector switched to failing mode".to_string());
        }
        Ok(self.detections.clone())
    }

    fn name(&self) -> &str {
        "stub"
    }
}
