//! analyze_frames - run image files through one stream session
//!
//! Frames are processed in the order given. Detections come from a replay
//! file recorded from a real detector (or nothing, if none is given). Each
//! frame result is printed as one JSON line; a metrics summary follows.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use stream_analytics::preprocessing::decode_frame;
use stream_analytics::{
    AnalyticsConfig, AnalyticsMetrics, Detector, FramePipeline, MemoryEventSink,
    MemoryFrameStore, PendingFrame, ReplayDetector, ResultPublisher, SponsorAnalyzer,
    StreamSessionManager, StubDetector,
};

#[derive(Parser, Debug)]
#[command(name = "analyze_frames", about = "Track objects and brands across a sequence of frames")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "cli")]
    stream_id: String,

    #[arg(long, default_value = "upload")]
    source_type: String,

    /// JSON file with recorded detections, one array per frame
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Also run the whole-frame sponsor scan on every frame
    #[arg(long)]
    sponsors: bool,

    /// Caption or chat text scored against sponsor keywords
    #[arg(long, requires = "sponsors")]
    text: Option<String>,

    /// Frame images, in stream order
    #[arg(required = true)]
    frames: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnalyticsConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalyticsConfig::default(),
    };

    let detector: Arc<dyn Detector> = match &args.detections {
        Some(path) => Arc::new(
            ReplayDetector::from_path(path)
                .with_context(|| format!("loading detections {}", path.display()))?,
        ),
        None => {
            log::warn!("No --detections given, frames will have no detections");
            Arc::new(StubDetector::empty())
        }
    };

    let metrics = Arc::new(AnalyticsMetrics::new());
    let pipeline = Arc::new(FramePipeline::new(&config, detector, Arc::clone(&metrics)));
    let sessions = Arc::new(StreamSessionManager::new(&config, pipeline));
    let publisher = ResultPublisher::new(
        Arc::new(MemoryEventSink::new()),
        Arc::new(MemoryFrameStore::new()),
        Arc::clone(&sessions),
    );
    let sponsors = args
        .sponsors
        .then(|| SponsorAnalyzer::new(config.sponsor.clone()));

    sessions.start(&args.stream_id, &args.source_type)?;

    for path in &args.frames {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;

        // Undecodable frames still go to the session so replayed detections
        // stay aligned with their frames
        let pending = match decode_frame(&bytes) {
            Ok(frame) => {
                if let Some(analyzer) = &sponsors {
                    let report = analyzer.analyze(&frame, args.text.as_deref());
                    println!("{}", serde_json::to_string(&report)?);
                }
                sessions.submit(&args.stream_id, frame)
            }
            Err(e) => sessions.submit_undecodable(&args.stream_id, e),
        };

        match pending.and_then(PendingFrame::wait) {
            Ok(result) => {
                publisher.publish(&result, &bytes)?;
                println!("{}", serde_json::to_string(&result)?);
            }
            Err(e) if e.is_per_frame() => {
                log::warn!("Frame {} failed: {}", path.display(), e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    sessions.shutdown();
    println!("{}", serde_json::to_string_pretty(&metrics.summary())?);
    Ok(())
}
