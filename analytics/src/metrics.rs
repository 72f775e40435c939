//! Process-wide analytics counters
//!
//! One `AnalyticsMetrics` is created at startup and shared (`Arc`) with the
//! pipeline and the session manager. Counters only ever grow; the sink is
//! never reset while the process runs.

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Number of recent processing durations kept for rolling statistics
pub const ROLLING_WINDOW: usize = 100;

#[derive(Debug)]
pub struct AnalyticsMetrics {
    pub total_frames: AtomicU64,
    pub total_detections: AtomicU64,
    pub brand_detections: AtomicU64,
    pub invalid_frames: AtomicU64,
    pub detector_failures: AtomicU64,
    pub capacity_rejections: AtomicU64,
    pub active_streams: AtomicUsize,
    class_histogram: Mutex<BTreeMap<String, u64>>,
    processing_times: Mutex<VecDeque<Duration>>,
    started_at: Instant,
}

impl Default for AnalyticsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Poisoned counters stay meaningful, so keep using them
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AnalyticsMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: AtomicU64::new(0),
            total_detections: AtomicU64::new(0),
            brand_detections: AtomicU64::new(0),
            invalid_frames: AtomicU64::new(0),
            detector_failures: AtomicU64::new(0),
            capacity_rejections: AtomicU64::new(0),
            active_streams: AtomicUsize::new(0),
            class_histogram: Mutex::new(BTreeMap::new()),
            processing_times: Mutex::new(VecDeque::with_capacity(ROLLING_WINDOW)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one successfully processed frame
    pub fn record_frame<'a, I>(&self, class_names: I, brand_count: usize, elapsed: Duration)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.total_frames.fetch_add(1, Ordering::Relaxed);
        self.brand_detections
            .fetch_add(brand_count as u64, Ordering::Relaxed);

        let mut detections = 0_u64;
        {
            let mut histogram = lock(&self.class_histogram);
            for name in class_names {
                *histogram.entry(name.to_string()).or_insert(0) += 1;
                detections += 1;
            }
        }
        self.total_detections.fetch_add(detections, Ordering::Relaxed);

        let mut times = lock(&self.processing_times);
        if times.len() == ROLLING_WINDOW {
            times.pop_front();
        }
        times.push_back(elapsed);
    }

    pub fn stream_started(&self) {
        self.active_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_stopped(&self) {
        // Saturating: a stop is only reported for a stream that was started
        let _ = self
            .active_streams
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Frames per second since the sink was created
    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn class_distribution(&self) -> BTreeMap<String, u64> {
        lock(&self.class_histogram).clone()
    }

    pub fn summary(&self) -> MetricsSummary {
        let times = lock(&self.processing_times);
        let secs: Vec<f64> = times.iter().map(Duration::as_secs_f64).collect();
        drop(times);

        let (avg, min, max) = if secs.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let sum: f64 = secs.iter().sum();
            let min = secs.iter().copied().fold(f64::INFINITY, f64::min);
            let max = secs.iter().copied().fold(0.0, f64::max);
            (sum / secs.len() as f64, min, max)
        };

        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            total_detections: self.total_detections.load(Ordering::Relaxed),
            brand_detections: self.brand_detections.load(Ordering::Relaxed),
            invalid_frames: self.invalid_frames.load(Ordering::Relaxed),
            detector_failures: self.detector_failures.load(Ordering::Relaxed),
            capacity_rejections: self.capacity_rejections.load(Ordering::Relaxed),
            active_streams: self.active_streams.load(Ordering::Relaxed),
            avg_processing_time: avg,
            min_processing_time: min,
            max_processing_time: max,
            fps: self.fps(),
            rolling_fps: if avg > 0.0 { 1.0 / avg } else { 0.0 },
            class_distribution: self.class_distribution(),
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub total_detections: u64,
    pub brand_detections: u64,
    pub invalid_frames: u64,
    pub detector_failures: u64,
    pub capacity_rejections: u64,
    pub active_streams: usize,
    /// Seconds, over the rolling window
    pub avg_processing_time: f64,
    pub min_processing_time: f64,
    pub max_processing_time: f64,
    pub fps: f64,
    /// Throughput implied by the rolling average processing time
    pub rolling_fps: f64,
    pub class_distribution: BTreeMap<String, u64>,
    pub uptime_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_frame() {
        let metrics = AnalyticsMetrics::new();
        metrics.record_frame(["can", "can", "bottle"], 1, Duration::from_millis(20));
        metrics.record_frame(["cup"], 0, Duration::from_millis(40));

        let summary = metrics.summary();
        assert_eq!(summary.total_frames, 2);
        assert_eq!(summary.total_detections, 4);
        assert_eq!(summary.brand_detections, 1);
        assert_eq!(summary.class_distribution.get("can"), Some(&2));
        assert_eq!(summary.class_distribution.get("cup"), Some(&1));
        assert_abs_diff_eq!(summary.avg_processing_time, 0.03, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.min_processing_time, 0.02, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.max_processing_time, 0.04, epsilon = 1e-9);
    }

    #[test]
    fn test_rolling_window_is_bounded() {
        let metrics = AnalyticsMetrics::new();
        for _ in 0..ROLLING_WINDOW {
            metrics.record_frame(std::iter::empty(), 0, Duration::from_secs(1));
        }
        for _ in 0..ROLLING_WINDOW {
            metrics.record_frame(std::iter::empty(), 0, Duration::from_millis(10));
        }
        let summary = metrics.summary();
        assert_eq!(summary.total_frames, 2 * ROLLING_WINDOW as u64);
        assert_abs_diff_eq!(summary.max_processing_time, 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_active_streams_never_underflows() {
        let metrics = AnalyticsMetrics::new();
        metrics.stream_started();
        metrics.stream_stopped();
        metrics.stream_stopped();
        assert_eq!(metrics.summary().active_streams, 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(AnalyticsMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..250 {
                        metrics.record_frame(["person"], 0, Duration::from_millis(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let summary = metrics.summary();
        assert_eq!(summary.total_frames, 1000);
        assert_eq!(summary.class_distribution.get("person"), Some(&1000));
    }
}
