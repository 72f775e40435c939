//! Runtime configuration for the analytics pipeline
//!
//! Every key is optional; a missing section falls back to its defaults.
//!
//! ```toml
//! max_concurrent_streams = 5
//!
//! [detector]
//! confidence_threshold = 0.5
//!
//! [tracking]
//! association = "optimal"
//! ```

use crate::brand::{BrandRule, SponsorBrand};
use crate::detector_trait::DetectionParams;
use crate::error::{AnalyticsError, Result};
use ioutrack::{Association, IouMultiTracker};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Largest frame the pipeline works on; bigger frames are scaled down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Frames a track may go unmatched before removal
    pub max_age: u32,
    /// Matches needed before a track is reported
    pub min_hits: u32,
    /// IoU a detection must exceed to continue a track
    pub match_iou_threshold: f32,
    pub association: Association,
    pub history_len: usize,
    pub exposed_history: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_age: 30,
            min_hits: 3,
            match_iou_threshold: 0.3,
            association: Association::Greedy,
            history_len: 30,
            exposed_history: 10,
        }
    }
}

impl TrackingConfig {
    /// Build a fresh tracker for one stream
    pub fn build_tracker(&self) -> IouMultiTracker {
        IouMultiTracker::new(self.max_age, self.min_hits, self.match_iou_threshold)
            .with_association(self.association)
            .with_history(self.history_len, self.exposed_history)
    }
}

/// Parameters of the k-means colour extraction
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansSettings {
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this (RGB units)
    pub epsilon: f32,
    /// Independent restarts; the most compact clustering wins
    pub attempts: usize,
    pub seed: u64,
}

impl Default for KMeansSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            epsilon: 1.0,
            attempts: 10,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandConfig {
    /// Colour similarity a region must exceed to be reported
    pub match_threshold: f32,
    pub color_clusters: usize,
    pub kmeans: KMeansSettings,
    pub eligible: Vec<BrandRule>,
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.6,
            color_clusters: 3,
            kmeans: KMeansSettings::default(),
            eligible: BrandRule::defaults(),
        }
    }
}

/// Whole-frame sponsor scan, configured independently of `BrandConfig`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SponsorConfig {
    pub match_threshold: f32,
    pub color_clusters: usize,
    pub top_k: usize,
    pub kmeans: KMeansSettings,
    pub brands: Vec<SponsorBrand>,
}

impl Default for SponsorConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.3,
            color_clusters: 5,
            top_k: 5,
            kmeans: KMeansSettings::default(),
            brands: SponsorBrand::defaults(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub detector: DetectionParams,
    pub max_resolution: Resolution,
    pub max_concurrent_streams: usize,
    /// Frames buffered per stream worker before submissions are refused
    pub stream_queue_depth: usize,
    pub tracking: TrackingConfig,
    pub brand: BrandConfig,
    pub sponsor: SponsorConfig,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            detector: DetectionParams::default(),
            max_resolution: Resolution::default(),
            max_concurrent_streams: 5,
            stream_queue_depth: 10,
            tracking: TrackingConfig::default(),
            brand: BrandConfig::default(),
            sponsor: SponsorConfig::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Load and validate a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config = Self::from_toml(&raw)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("detector.confidence_threshold", self.detector.confidence_threshold)?;
        check_unit("detector.iou_threshold", self.detector.iou_threshold)?;
        check_unit("tracking.match_iou_threshold", self.tracking.match_iou_threshold)?;
        check_unit("brand.match_threshold", self.brand.match_threshold)?;
        check_unit("sponsor.match_threshold", self.sponsor.match_threshold)?;

        if self.detector.max_detections == 0 {
            return Err(AnalyticsError::config("detector.max_detections must be > 0"));
        }
        if self.max_resolution.width == 0 || self.max_resolution.height == 0 {
            return Err(AnalyticsError::config(format!(
                "max_resolution must be non-zero, got {}x{}",
                self.max_resolution.width, self.max_resolution.height
            )));
        }
        if self.max_concurrent_streams == 0 {
            return Err(AnalyticsError::config("max_concurrent_streams must be > 0"));
        }
        if self.stream_queue_depth == 0 {
            return Err(AnalyticsError::config("stream_queue_depth must be > 0"));
        }
        if self.tracking.min_hits == 0 {
            return Err(AnalyticsError::config("tracking.min_hits must be > 0"));
        }
        if self.tracking.history_len == 0 {
            return Err(AnalyticsError::config("tracking.history_len must be > 0"));
        }
        if self.brand.color_clusters == 0 || self.sponsor.color_clusters == 0 {
            return Err(AnalyticsError::config("color_clusters must be > 0"));
        }
        for kmeans in [&self.brand.kmeans, &self.sponsor.kmeans] {
            if kmeans.max_iterations == 0 || kmeans.attempts == 0 {
                return Err(AnalyticsError::config(
                    "kmeans max_iterations and attempts must be > 0",
                ));
            }
        }
        for rule in &self.brand.eligible {
            if rule.colors.is_empty() {
                return Err(AnalyticsError::config(format!(
                    "brand rule '{}' has no reference colors",
                    rule.brand
                )));
            }
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AnalyticsError::config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}
