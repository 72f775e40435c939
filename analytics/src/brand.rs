//! Colour-based brand and sponsor matching
//!
//! `BrandMatcher` runs per frame on the regions of accepted detections whose
//! class a rule allows. `SponsorAnalyzer` is the coarser whole-frame scan with
//! optional caption/chat keywords; it has its own palette set and threshold.

use crate::color_analysis::{crop_pixels, extract_colors, frame_pixels, match_colors};
use crate::config::{BrandConfig, KMeansSettings, SponsorConfig};
use crate::types::{BrandDetection, Color, Detection, COLOR_ANALYSIS};
use image::RgbImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Reference palette for one brand and the object classes it may appear on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandRule {
    pub brand: String,
    pub colors: Vec<Color>,
    pub eligible_classes: Vec<String>,
}

impl BrandRule {
    pub fn new(brand: &str, colors: &[Color], eligible_classes: &[&str]) -> Self {
        Self {
            brand: brand.to_string(),
            colors: colors.to_vec(),
            eligible_classes: eligible_classes.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn applies_to(&self, class_name: &str) -> bool {
        self.eligible_classes.iter().any(|c| c == class_name)
    }

    /// Beverage brands: colas on bottles and cans, energy drinks on cans
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("coca_cola", &[[220, 20, 60], [255, 255, 255]], &["bottle", "can"]),
            Self::new("pepsi", &[[0, 50, 153], [220, 20, 60]], &["bottle", "can"]),
            Self::new("redbull", &[[0, 45, 156], [255, 209, 0]], &["can"]),
            Self::new("monster", &[[0, 166, 81], [0, 0, 0]], &["can"]),
        ]
    }
}

/// Matches detected object regions against the brand rules
pub struct BrandMatcher {
    rules: Vec<BrandRule>,
    threshold: f32,
    clusters: usize,
    kmeans: KMeansSettings,
}

impl BrandMatcher {
    pub fn new(config: &BrandConfig) -> Self {
        Self {
            rules: config.eligible.clone(),
            threshold: config.match_threshold,
            clusters: config.color_clusters,
            kmeans: config.kmeans,
        }
    }

    pub fn rules(&self) -> &[BrandRule] {
        &self.rules
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Find brand colours inside the regions of `detections`.
    ///
    /// Boxes are in `frame` coordinates. A detection is only cropped when at
    /// least one rule allows its class; empty crops are skipped. Results keep
    /// detection order, then rule order.
    pub fn detect_brands(&self, frame: &RgbImage, detections: &[Detection]) -> Vec<BrandDetection> {
        detections
            .par_iter()
            .flat_map_iter(|det| self.match_detection(frame, det))
            .collect()
    }

    fn match_detection(&self, frame: &RgbImage, det: &Detection) -> Vec<BrandDetection> {
        let rules: Vec<&BrandRule> = self
            .rules
            .iter()
            .filter(|r| r.applies_to(&det.class_name))
            .collect();
        if rules.is_empty() {
            return Vec::new();
        }

        let Some(pixels) = crop_pixels(frame, &det.bbox) else {
            log::debug!("Skipping empty region {} ({})", det.bbox, det.class_name);
            return Vec::new();
        };
        let colors = extract_colors(&pixels, self.clusters, &self.kmeans);

        rules
            .into_iter()
            .filter_map(|rule| {
                let score = match_colors(&colors, &rule.colors);
                (score > self.threshold).then(|| BrandDetection {
                    brand: rule.brand.clone(),
                    confidence: score,
                    bbox: det.bbox,
                    detection_method: COLOR_ANALYSIS.to_string(),
                    object_type: det.class_name.clone(),
                })
            })
            .collect()
    }
}

/// Sponsor palette plus the keywords that name it in captions or chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorBrand {
    pub brand: String,
    pub colors: Vec<Color>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl SponsorBrand {
    pub fn new(brand: &str, colors: &[Color], keywords: &[&str]) -> Self {
        Self {
            brand: brand.to_string(),
            colors: colors.to_vec(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("redbull", &[[0, 45, 156], [255, 209, 0]], &["red bull", "redbull", "energy"]),
            Self::new("monster", &[[0, 166, 81], [0, 0, 0]], &["monster", "energy", "claw"]),
            Self::new("nike", &[[0, 0, 0], [255, 255, 255]], &["nike", "swoosh", "just do it"]),
            Self::new("adidas", &[[0, 0, 0], [255, 255, 255]], &["adidas", "three stripes"]),
            Self::new("coca_cola", &[[220, 20, 60], [255, 255, 255]], &["coca cola", "coke"]),
            Self::new("pepsi", &[[0, 50, 153], [220, 20, 60]], &["pepsi", "cola"]),
            Self::new("mcdonalds", &[[255, 199, 44], [218, 41, 28]], &["mcdonalds", "golden arches"]),
            Self::new("twitch", &[[100, 65, 165], [255, 255, 255]], &["twitch", "stream"]),
            Self::new("discord", &[[88, 101, 242], [255, 255, 255]], &["discord", "chat"]),
            Self::new("spotify", &[[30, 215, 96], [0, 0, 0]], &["spotify", "music"]),
        ]
    }

    /// Fraction of keywords found in `text` (case-insensitive), capped at 1
    pub fn text_score(&self, text: &str) -> f32 {
        if self.keywords.is_empty() {
            return 0.0;
        }
        let text = text.to_lowercase();
        let hits = self
            .keywords
            .iter()
            .filter(|k| text.contains(&k.to_lowercase()))
            .count();
        (hits as f32 / self.keywords.len() as f32).min(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorMatch {
    pub brand: String,
    pub color_confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_confidence: Option<f32>,
    pub overall_confidence: f32,
    pub detection_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorReport {
    /// Best matches first
    pub matches: Vec<SponsorMatch>,
    pub dominant_colors: Vec<Color>,
    /// Seconds
    pub processing_time: f64,
}

/// Whole-frame sponsor scan
pub struct SponsorAnalyzer {
    config: SponsorConfig,
}

impl SponsorAnalyzer {
    pub fn new(config: SponsorConfig) -> Self {
        Self { config }
    }

    /// Score every sponsor against the frame's dominant colours and, when
    /// non-empty `text` is given, its keywords
    pub fn analyze(&self, frame: &RgbImage, text: Option<&str>) -> SponsorReport {
        let start = Instant::now();
        let text = text.filter(|t| !t.trim().is_empty());
        let dominant_colors = extract_colors(
            &frame_pixels(frame),
            self.config.color_clusters,
            &self.config.kmeans,
        );

        let mut matches: Vec<SponsorMatch> = self
            .config
            .brands
            .iter()
            .map(|sponsor| {
                let color_confidence = match_colors(&dominant_colors, &sponsor.colors);
                let text_confidence = text.map(|t| sponsor.text_score(t));
                let overall_confidence = match text_confidence {
                    Some(t) => (color_confidence + t) / 2.0,
                    None => color_confidence,
                };
                SponsorMatch {
                    brand: sponsor.brand.clone(),
                    color_confidence,
                    text_confidence,
                    overall_confidence,
                    detection_method: COLOR_ANALYSIS.to_string(),
                }
            })
            .filter(|m| m.overall_confidence > self.config.match_threshold)
            .collect();

        matches.sort_by(|a, b| b.overall_confidence.total_cmp(&a.overall_confidence));
        matches.truncate(self.config.top_k);

        SponsorReport {
            matches,
            dominant_colors,
            processing_time: start.elapsed().as_secs_f64(),
        }
    }
}
