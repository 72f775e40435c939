//! Stream session admission and routing
//!
//! The manager enforces a hard cap on concurrently analysed streams. Each
//! admitted stream gets its own `StreamWorker` (and with it a fresh tracker);
//! frames for a stream are routed to that worker. The admission table lock is
//! only held to look up or change entries, never while a frame is processed.

use crate::config::{AnalyticsConfig, TrackingConfig};
use crate::error::{AnalyticsError, Result};
use crate::frame_pipeline::FramePipeline;
use crate::metrics::AnalyticsMetrics;
use crate::preprocessing::decode_frame;
use crate::stream_worker::{PendingFrame, StreamWorker};
use crate::types::{FrameResult, SessionStatus, StreamSession};
use chrono::{DateTime, Utc};
use image::RgbImage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Returned on admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub stream_id: String,
    /// Process-unique generation, stamped on every result of this session
    pub session: u64,
    pub created_at: DateTime<Utc>,
}

struct SessionEntry {
    session: u64,
    source_type: String,
    created_at: DateTime<Utc>,
    worker: StreamWorker,
}

impl SessionEntry {
    fn snapshot(&self, stream_id: &str) -> StreamSession {
        StreamSession {
            stream_id: stream_id.to_string(),
            source_type: self.source_type.clone(),
            status: SessionStatus::Active,
            created_at: self.created_at,
            frame_count: self.worker.frames_processed(),
        }
    }
}

pub struct StreamSessionManager {
    max_streams: usize,
    queue_depth: usize,
    tracking: TrackingConfig,
    pipeline: Arc<FramePipeline>,
    metrics: Arc<AnalyticsMetrics>,
    next_session: AtomicU64,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl StreamSessionManager {
    pub fn new(config: &AnalyticsConfig, pipeline: Arc<FramePipeline>) -> Self {
        let metrics = Arc::clone(pipeline.metrics());
        Self {
            max_streams: config.max_concurrent_streams,
            queue_depth: config.stream_queue_depth,
            tracking: config.tracking.clone(),
            pipeline,
            metrics,
            next_session: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn max_streams(&self) -> usize {
        self.max_streams
    }

    pub fn metrics(&self) -> &Arc<AnalyticsMetrics> {
        &self.metrics
    }

    /// Admit a stream and start its worker.
    ///
    /// Starting a stream that is already active returns its existing handle
    /// and keeps its tracker. Fails with `CapacityExceeded` at the cap; the
    /// request is not queued.
    pub fn start(&self, stream_id: &str, source_type: &str) -> Result<SessionHandle> {
        let mut sessions = self.sessions();

        if let Some(entry) = sessions.get(stream_id) {
            log::debug!("Stream {} already active", stream_id);
            return Ok(SessionHandle {
                stream_id: stream_id.to_string(),
                session: entry.session,
                created_at: entry.created_at,
            });
        }

        if sessions.len() >= self.max_streams {
            self.metrics.inc(&self.metrics.capacity_rejections);
            log::warn!(
                "Refusing stream {}: {} of {} slots in use",
                stream_id,
                sessions.len(),
                self.max_streams
            );
            return Err(AnalyticsError::CapacityExceeded {
                limit: self.max_streams,
            });
        }

        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let worker = StreamWorker::spawn(
            stream_id,
            session,
            Arc::clone(&self.pipeline),
            self.tracking.build_tracker(),
            self.queue_depth,
        )?;
        let created_at = Utc::now();
        sessions.insert(
            stream_id.to_string(),
            SessionEntry {
                session,
                source_type: source_type.to_string(),
                created_at,
                worker,
            },
        );
        self.metrics.stream_started();

        log::info!(
            "Started stream {} ({}), {}/{} slots in use",
            stream_id,
            source_type,
            sessions.len(),
            self.max_streams
        );
        Ok(SessionHandle {
            stream_id: stream_id.to_string(),
            session,
            created_at,
        })
    }

    /// Evict a stream; unknown ids are a no-op.
    ///
    /// The slot is freed immediately. A frame already being processed for the
    /// stream runs to completion; frames still queued are answered with
    /// `UnknownStream`. Returns the final session snapshot if one was removed.
    pub fn stop(&self, stream_id: &str) -> Option<StreamSession> {
        let entry = self.sessions().remove(stream_id)?;

        let mut session = entry.snapshot(stream_id);
        session.status = SessionStatus::Stopped;
        entry.worker.stop();
        // Dropping the worker detaches its thread
        drop(entry);
        self.metrics.stream_stopped();

        log::info!(
            "Stopped stream {} after {} frames",
            stream_id,
            session.frame_count
        );
        Some(session)
    }

    /// Snapshot of all active sessions, oldest first
    pub fn list(&self) -> Vec<StreamSession> {
        let mut sessions: Vec<StreamSession> = self
            .sessions()
            .iter()
            .map(|(id, entry)| entry.snapshot(id))
            .collect();
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.stream_id.cmp(&b.stream_id))
        });
        sessions
    }

    pub fn get(&self, stream_id: &str) -> Option<StreamSession> {
        self.sessions()
            .get(stream_id)
            .map(|entry| entry.snapshot(stream_id))
    }

    pub fn is_active(&self, stream_id: &str) -> bool {
        self.sessions().contains_key(stream_id)
    }

    /// Whether `session` is the live session of `stream_id`; false once the
    /// stream was stopped, even if it has since been started again
    pub fn is_current(&self, stream_id: &str, session: u64) -> bool {
        self.sessions()
            .get(stream_id)
            .is_some_and(|entry| entry.session == session)
    }

    pub fn active_count(&self) -> usize {
        self.sessions().len()
    }

    /// Queue a frame for `stream_id` without blocking
    pub fn submit(&self, stream_id: &str, frame: RgbImage) -> Result<PendingFrame> {
        let sessions = self.sessions();
        let entry = sessions
            .get(stream_id)
            .ok_or_else(|| AnalyticsError::unknown_stream(stream_id))?;
        entry.worker.submit(frame)
    }

    /// Queue a frame whose bytes failed to decode, keeping its place in the
    /// stream's frame order
    pub fn submit_undecodable(&self, stream_id: &str, error: AnalyticsError) -> Result<PendingFrame> {
        let sessions = self.sessions();
        let entry = sessions
            .get(stream_id)
            .ok_or_else(|| AnalyticsError::unknown_stream(stream_id))?;
        entry.worker.submit_undecodable(error)
    }

    /// Queue a frame and wait for its result
    pub fn process(&self, stream_id: &str, frame: RgbImage) -> Result<FrameResult> {
        // The table lock is released before waiting
        let pending = self.submit(stream_id, frame)?;
        pending.wait()
    }

    /// Decode `bytes` and process them as the stream's next frame.
    ///
    /// Bytes that do not decode still pass through the stream's worker and
    /// come back as `InvalidFrame`.
    pub fn process_encoded(&self, stream_id: &str, bytes: &[u8]) -> Result<FrameResult> {
        let pending = match decode_frame(bytes) {
            Ok(frame) => self.submit(stream_id, frame)?,
            Err(e) => self.submit_undecodable(stream_id, e)?,
        };
        pending.wait()
    }

    /// Stop every session
    pub fn shutdown(&self) {
        let drained: Vec<(String, SessionEntry)> = self.sessions().drain().collect();
        for (stream_id, entry) in drained {
            entry.worker.join();
            self.metrics.stream_stopped();
            log::info!("Stopped stream {} on shutdown", stream_id);
        }
    }
}
