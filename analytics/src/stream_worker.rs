/// Per-stream worker thread
///
/// Each admitted stream gets one worker that exclusively owns the stream's
/// tracker. Frames arrive over a bounded channel and are processed strictly
/// in arrival order, so a slow detector call only delays its own stream.
use crate::error::{AnalyticsError, Result};
use crate::frame_pipeline::FramePipeline;
use crate::types::FrameResult;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use image::RgbImage;
use ioutrack::IouMultiTracker;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Frames between throughput log lines
const STATS_INTERVAL: u64 = 100;

enum FrameInput {
    Frame(RgbImage),
    /// Bytes that failed to decode; queued so the frame keeps its place
    Undecodable(AnalyticsError),
}

/// One queued frame and where its result goes
struct FrameJob {
    input: FrameInput,
    respond_to: Sender<Result<FrameResult>>,
}

/// Result of a submitted frame, delivered once the worker gets to it
pub struct PendingFrame {
    stream_id: String,
    rx: Receiver<Result<FrameResult>>,
}

impl PendingFrame {
    /// Block until the worker has processed the frame
    pub fn wait(self) -> Result<FrameResult> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(AnalyticsError::unknown_stream(self.stream_id)))
    }
}

pub struct StreamWorker {
    stream_id: String,
    job_tx: Sender<FrameJob>,
    stopped: Arc<AtomicBool>,
    frames_processed: Arc<AtomicU64>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StreamWorker {
    /// Spawn the worker thread; it owns `tracker` from here on.
    ///
    /// Every result it produces is stamped with `session`.
    pub fn spawn(
        stream_id: &str,
        session: u64,
        pipeline: Arc<FramePipeline>,
        tracker: IouMultiTracker,
        queue_depth: usize,
    ) -> Result<Self> {
        let (job_tx, job_rx) = bounded::<FrameJob>(queue_depth.max(1));
        let stopped = Arc::new(AtomicBool::new(false));
        let frames_processed = Arc::new(AtomicU64::new(0));

        let handle = {
            let stream_id = stream_id.to_string();
            let stopped = Arc::clone(&stopped);
            let frames_processed = Arc::clone(&frames_processed);
            thread::Builder::new()
                .name(format!("stream-{}", stream_id))
                .spawn(move || {
                    Self::worker_thread(
                        stream_id,
                        session,
                        pipeline,
                        tracker,
                        job_rx,
                        stopped,
                        frames_processed,
                    )
                })?
        };

        Ok(Self {
            stream_id: stream_id.to_string(),
            job_tx,
            stopped,
            frames_processed,
            handle: Some(handle),
        })
    }

    /// Worker thread: processes frames in order with the stream's tracker
    fn worker_thread(
        stream_id: String,
        session: u64,
        pipeline: Arc<FramePipeline>,
        mut tracker: IouMultiTracker,
        job_rx: Receiver<FrameJob>,
        stopped: Arc<AtomicBool>,
        frames_processed: Arc<AtomicU64>,
    ) {
        log::debug!("[{}] Stream worker started", stream_id);
        let started = Instant::now();
        let mut failed = 0_u64;

        while let Ok(job) = job_rx.recv() {
            // Frames still queued when the stream stops are not processed
            if stopped.load(Ordering::Acquire) {
                let _ = job
                    .respond_to
                    .send(Err(AnalyticsError::unknown_stream(stream_id.as_str())));
                continue;
            }

            let result = match job.input {
                FrameInput::Frame(frame) => pipeline
                    .process(&frame, &stream_id, &mut tracker)
                    .map(|mut result| {
                        result.session = session;
                        result
                    }),
                FrameInput::Undecodable(error) => Err(pipeline.reject(&stream_id, error)),
            };
            if result.is_err() {
                failed += 1;
            }
            let total = frames_processed.fetch_add(1, Ordering::Relaxed) + 1;

            // The submitter may have given up waiting
            if job.respond_to.send(result).is_err() {
                log::debug!("[{}] Result receiver dropped", stream_id);
            }

            if total % STATS_INTERVAL == 0 {
                let elapsed = started.elapsed().as_secs_f64();
                log::info!(
                    "[{}] Stream stats: {} frames ({} failed), {:.1} fps, {} live tracks",
                    stream_id,
                    total,
                    failed,
                    if elapsed > 0.0 { total as f64 / elapsed } else { 0.0 },
                    tracker.num_tracklets()
                );
            }
        }

        log::debug!(
            "[{}] Stream worker exiting after {} frames",
            stream_id,
            frames_processed.load(Ordering::Relaxed)
        );
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Frames run through the pipeline so far (including failed ones)
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    /// Number of frames waiting in the queue
    pub fn queued(&self) -> usize {
        self.job_tx.len()
    }

    /// Queue a frame without blocking.
    ///
    /// Fails with `StreamBusy` when the queue is full.
    pub fn submit(&self, frame: RgbImage) -> Result<PendingFrame> {
        self.enqueue(FrameInput::Frame(frame))
    }

    /// Queue a frame whose bytes could not be decoded.
    ///
    /// It is answered with `error` once the frames ahead of it are done, and
    /// counts as an invalid frame.
    pub fn submit_undecodable(&self, error: AnalyticsError) -> Result<PendingFrame> {
        self.enqueue(FrameInput::Undecodable(error))
    }

    fn enqueue(&self, input: FrameInput) -> Result<PendingFrame> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(AnalyticsError::unknown_stream(self.stream_id.as_str()));
        }

        let (respond_to, rx) = bounded(1);
        match self.job_tx.try_send(FrameJob { input, respond_to }) {
            Ok(()) => Ok(PendingFrame {
                stream_id: self.stream_id.clone(),
                rx,
            }),
            Err(TrySendError::Full(_)) => {
                log::warn!("[{}] Frame queue full, frame rejected", self.stream_id);
                Err(AnalyticsError::StreamBusy(self.stream_id.clone()))
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(AnalyticsError::unknown_stream(self.stream_id.as_str()))
            }
        }
    }

    /// Stop accepting frames; a frame already being processed still completes
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Stop and wait for the worker thread to exit
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let (tx, _) = bounded(0);
            // Replacing the sender closes the channel so the thread can exit
            drop(std::mem::replace(&mut self.job_tx, tx));
            if handle.join().is_err() {
                log::error!("[{}] Stream worker panicked", self.stream_id);
            }
        }
    }
}

impl Drop for StreamWorker {
    fn drop(&mut self) {
        // Detach: dropping the sender ends the worker loop on its own thread
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::detector_trait::{DetectionParams, Detector};
    use crate::metrics::AnalyticsMetrics;
    use crate::types::{Bbox, Detection};
    use std::time::Duration;

    /// Blocks every call until the test releases it
    struct GatedDetector {
        gate: Receiver<()>,
    }

    impl Detector for GatedDetector {
        fn detect(&self, _frame: &RgbImage, _params: &DetectionParams) -> std::result::Result<Vec<Detection>, String> {
            self.gate
                .recv_timeout(Duration::from_secs(5))
                .map_err(|e| e.to_string())?;
            Ok(vec![Detection::new(Bbox::new(0.0, 0.0, 4.0, 4.0), 0.9, 0, "can")])
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    fn gated_worker(queue_depth: usize) -> (StreamWorker, Sender<()>) {
        let (gate_tx, gate_rx) = bounded(16);
        let config = AnalyticsConfig::default();
        let pipeline = Arc::new(FramePipeline::new(
            &config,
            Arc::new(GatedDetector { gate: gate_rx }),
            Arc::new(AnalyticsMetrics::new()),
        ));
        let worker =
            StreamWorker::spawn("gated", 7, pipeline, config.tracking.build_tracker(), queue_depth).unwrap();
        (worker, gate_tx)
    }

    #[test]
    fn test_frames_processed_in_order() {
        let (worker, gate) = gated_worker(4);
        let pending: Vec<_> = (0..3)
            .map(|_| worker.submit(RgbImage::new(8, 8)).unwrap())
            .collect();
        for _ in 0..3 {
            gate.send(()).unwrap();
        }
        let results: Vec<FrameResult> = pending.into_iter().map(|p| p.wait().unwrap()).collect();
        let indices: Vec<u64> = results.iter().map(|r| r.frame_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(results.iter().all(|r| r.session == 7));
        assert_eq!(worker.frames_processed(), 3);
        worker.join();
    }

    #[test]
    fn test_full_queue_rejects_without_blocking() {
        let (worker, gate) = gated_worker(1);
        // First frame is picked up by the worker and blocks in the detector
        let first = worker.submit(RgbImage::new(8, 8)).unwrap();
        let mut accepted = vec![first];
        let mut busy = 0;
        for _ in 0..4 {
            match worker.submit(RgbImage::new(8, 8)) {
                Ok(p) => accepted.push(p),
                Err(AnalyticsError::StreamBusy(id)) => {
                    assert_eq!(id, "gated");
                    busy += 1;
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        // At most one in flight plus one queued
        assert!(accepted.len() <= 2);
        assert!(busy >= 3);

        for _ in 0..accepted.len() {
            gate.send(()).unwrap();
        }
        for p in accepted {
            assert!(p.wait().is_ok());
        }
        worker.join();
    }

    #[test]
    fn test_undecodable_frame_answered_in_order() {
        let (worker, gate) = gated_worker(4);
        let first = worker.submit(RgbImage::new(8, 8)).unwrap();
        let broken = worker
            .submit_undecodable(AnalyticsError::invalid_frame("truncated png"))
            .unwrap();
        let last = worker.submit(RgbImage::new(8, 8)).unwrap();
        // Only the two real frames reach the detector
        gate.send(()).unwrap();
        gate.send(()).unwrap();

        assert_eq!(first.wait().unwrap().frame_index, 1);
        assert!(matches!(broken.wait(), Err(AnalyticsError::InvalidFrame(_))));
        // The undecodable frame did not advance the tracker
        assert_eq!(last.wait().unwrap().frame_index, 2);
        assert_eq!(worker.frames_processed(), 3);
        worker.join();
    }

    #[test]
    fn test_stopped_worker_refuses_frames() {
        let (worker, _gate) = gated_worker(2);
        worker.stop();
        assert!(matches!(
            worker.submit(RgbImage::new(8, 8)),
            Err(AnalyticsError::UnknownStream(_))
        ));
        worker.join();
    }
}
