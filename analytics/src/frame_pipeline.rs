/// Per-frame analysis pipeline
///
/// Processes single frames through:
/// 1. Pre-processing: resolution capping (never upscales)
/// 2. Detection: the injected detector collaborator
/// 3. Post-processing: confidence/box validation and the detection cap
/// 4. Tracking: the caller's per-stream tracker
/// 5. Brand matching: colour analysis of every accepted detection's region
///
/// The pipeline is immutable and shared by all stream workers; the only state
/// a call touches is the tracker passed in by the stream that owns it.
use crate::brand::BrandMatcher;
use crate::config::{AnalyticsConfig, Resolution};
use crate::detector_trait::{DetectionParams, Detector};
use crate::error::{AnalyticsError, Result};
use crate::metrics::AnalyticsMetrics;
use crate::postprocessing::Postprocessor;
use crate::preprocessing::{check_dimensions, resize_to_fit};
use crate::types::{FrameInfo, FrameResult};
use chrono::Utc;
use image::RgbImage;
use ioutrack::IouMultiTracker;
use std::sync::Arc;
use std::time::Instant;

pub struct FramePipeline {
    detector: Arc<dyn Detector>,
    params: DetectionParams,
    max_resolution: Resolution,
    postprocessor: Postprocessor,
    brand_matcher: BrandMatcher,
    metrics: Arc<AnalyticsMetrics>,
}

impl FramePipeline {
    pub fn new(
        config: &AnalyticsConfig,
        detector: Arc<dyn Detector>,
        metrics: Arc<AnalyticsMetrics>,
    ) -> Self {
        log::info!(
            "Frame pipeline using '{}' detector (confidence >= {}, max {} detections, cap {}x{})",
            detector.name(),
            config.detector.confidence_threshold,
            config.detector.max_detections,
            config.max_resolution.width,
            config.max_resolution.height
        );
        Self {
            detector,
            params: config.detector,
            max_resolution: config.max_resolution,
            postprocessor: Postprocessor::new(&config.detector),
            brand_matcher: BrandMatcher::new(&config.brand),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<AnalyticsMetrics> {
        &self.metrics
    }

    pub fn brand_matcher(&self) -> &BrandMatcher {
        &self.brand_matcher
    }

    /// Account for a frame of `stream_id` that cannot be analysed.
    ///
    /// Counts it as invalid and lets the detector skip its slot; the tracker is
    /// not touched. Returns `error` for the caller to hand back.
    pub fn reject(&self, stream_id: &str, error: AnalyticsError) -> AnalyticsError {
        self.metrics.inc(&self.metrics.invalid_frames);
        self.detector.skip_frame();
        log::warn!("[{}] Skipping frame: {}", stream_id, error);
        error
    }

    /// Run one frame of `stream_id` through the pipeline.
    ///
    /// An invalid frame leaves the tracker untouched. A detector failure ages
    /// every track by one frame, as if the frame had no detections, and the
    /// frame is dropped.
    pub fn process(
        &self,
        frame: &RgbImage,
        stream_id: &str,
        tracker: &mut IouMultiTracker,
    ) -> Result<FrameResult> {
        let start = Instant::now();

        if let Err(e) = check_dimensions(frame) {
            return Err(self.reject(stream_id, e));
        }

        let prepared = resize_to_fit(frame, self.max_resolution);

        let raw = match self.detector.detect(&prepared.image, &self.params) {
            Ok(raw) => raw,
            Err(e) => {
                tracker.update(&[]);
                self.metrics.inc(&self.metrics.detector_failures);
                log::warn!(
                    "[{}] Detector '{}' failed, frame dropped: {}",
                    stream_id,
                    self.detector.name(),
                    e
                );
                return Err(AnalyticsError::detector(e));
            }
        };

        let sanitized = self
            .postprocessor
            .process(raw, prepared.width(), prepared.height());
        if sanitized.below_confidence + sanitized.degenerate + sanitized.truncated > 0 {
            log::debug!(
                "[{}] Dropped detections: {} low confidence, {} degenerate, {} over cap",
                stream_id,
                sanitized.below_confidence,
                sanitized.degenerate,
                sanitized.truncated
            );
        }

        let frame_index = tracker.next_frame_index();

        // Brand regions are cropped from the frame the detector saw
        let mut brand_detections = self
            .brand_matcher
            .detect_brands(&prepared.image, &sanitized.detections);
        for brand in &mut brand_detections {
            brand.bbox = prepared.to_original(&brand.bbox);
        }

        // Tracks live in original-frame coordinates
        let detections: Vec<_> = sanitized
            .detections
            .into_iter()
            .map(|mut det| {
                det.bbox = prepared.to_original(&det.bbox);
                det.with_frame_index(frame_index)
            })
            .collect();

        let tracked_objects = tracker.update(&detections);

        let elapsed = start.elapsed();
        self.metrics.record_frame(
            detections.iter().map(|d| d.class_name.as_str()),
            brand_detections.len(),
            elapsed,
        );

        log::debug!(
            "[{}] Frame {}: {} detections, {} tracks ({} confirmed), {} brands in {:.1}ms",
            stream_id,
            frame_index,
            detections.len(),
            tracker.num_tracklets(),
            tracked_objects.len(),
            brand_detections.len(),
            elapsed.as_secs_f64() * 1000.0
        );

        Ok(FrameResult {
            stream_id: stream_id.to_string(),
            // Stamped by the stream's worker
            session: 0,
            frame_index,
            detections,
            tracked_objects,
            brand_detections,
            frame_info: FrameInfo {
                width: prepared.width(),
                height: prepared.height(),
                original_width: prepared.original_width,
                original_height: prepared.original_height,
                processing_time: elapsed.as_secs_f64(),
            },
            timestamp: Utc::now(),
        })
    }
}
