//! Stream Analytics Library
//!
//! Turns per-frame detector output into persistent object tracks and
//! colour-based brand signals for a bounded number of concurrently analysed
//! video streams.
//!
//! The pieces fit together as follows:
//! - `FramePipeline` runs one frame through resizing, detection, validation,
//!   tracking and brand matching; it is shared by every stream.
//! - `StreamSessionManager` admits up to `max_concurrent_streams` streams and
//!   gives each one a `StreamWorker` thread that owns the stream's tracker.
//! - `ResultPublisher` hands results to the event sink and frame store.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stream_analytics::{AnalyticsConfig, AnalyticsMetrics, FramePipeline, StreamSessionManager, StubDetector};
//!
//! let config = AnalyticsConfig::default();
//! let metrics = Arc::new(AnalyticsMetrics::new());
//! let pipeline = Arc::new(FramePipeline::new(&config, Arc::new(StubDetector::empty()), metrics));
//! let sessions = StreamSessionManager::new(&config, pipeline);
//! sessions.start("cam-1", "webcam")?;
//! let result = sessions.process("cam-1", frame)?;
//! ```

pub mod brand;
pub mod color_analysis;
pub mod config;
pub mod detector_replay;
pub mod detector_stub;
pub mod detector_trait;
pub mod error;
pub mod frame_pipeline;
pub mod metrics;
pub mod postprocessing;
pub mod preprocessing;
pub mod publish;
pub mod session;
pub mod stream_worker;
pub mod types;

pub use brand::{BrandMatcher, BrandRule, SponsorAnalyzer, SponsorBrand, SponsorMatch, SponsorReport};
pub use color_analysis::{extract_colors, match_colors};
pub use config::{AnalyticsConfig, BrandConfig, Resolution, SponsorConfig, TrackingConfig};
pub use detector_replay::ReplayDetector;
pub use detector_stub::StubDetector;
pub use detector_trait::{DetectionParams, Detector};
pub use error::{AnalyticsError, Result};
pub use frame_pipeline::FramePipeline;
pub use metrics::{AnalyticsMetrics, MetricsSummary};
pub use publish::{
    EventSink, FrameRecord, FrameStore, MemoryEventSink, MemoryFrameStore, ResultPublisher,
};
pub use session::{SessionHandle, StreamSessionManager};
pub use stream_worker::{PendingFrame, StreamWorker};
pub use types::{
    Bbox, BrandDetection, Color, Detection, FrameInfo, FrameResult, SessionStatus,
    StreamSession, TrackSnapshot,
};

pub use ioutrack::{Association, IouMultiTracker};

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
