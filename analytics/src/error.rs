//! Error types for the stream analytics library

use thiserror::Error;

/// Result type alias for the analytics library
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Errors that can occur while admitting streams or processing frames.
///
/// Everything except `CapacityExceeded` is a per-frame failure: it is reported
/// for the frame that caused it and never terminates the stream session.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Maximum concurrent streams reached ({limit})")]
    CapacityExceeded { limit: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("Unknown stream: {0}")]
    UnknownStream(String),

    #[error("Stream {0} is busy, frame queue full")]
    StreamBusy(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Publication failed: {0}")]
    Publish(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl AnalyticsError {
    pub fn invalid_frame<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFrame(msg.into())
    }

    pub fn detector<S: Into<String>>(msg: S) -> Self {
        Self::DetectorUnavailable(msg.into())
    }

    pub fn unknown_stream<S: Into<String>>(stream_id: S) -> Self {
        Self::UnknownStream(stream_id.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn publish<S: Into<String>>(msg: S) -> Self {
        Self::Publish(msg.into())
    }

    /// True for failures scoped to a single frame
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            Self::InvalidFrame(_) | Self::DetectorUnavailable(_) | Self::StreamBusy(_)
        )
    }
}
