//! Benchmarks for the per-frame analytics pipeline

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};
use std::hint::black_box;
use std::sync::Arc;
use stream_analytics::{
    AnalyticsConfig, AnalyticsMetrics, Bbox, Detection, FramePipeline, StubDetector,
};

fn cans(n: usize) -> Vec<Detection> {
    (0..n)
        .map(|i| {
            let x = (i % 10) as f32 * 120.0;
            let y = (i / 10) as f32 * 120.0;
            Detection::new(Bbox::new(x, y, x + 80.0, y + 100.0), 0.9, 0, "can")
        })
        .collect()
}

fn bench_process_frame(c: &mut Criterion) {
    let config = AnalyticsConfig::default();
    let mut group = c.benchmark_group("process_frame_by_detection_count");
    group.sample_size(20);

    let frame = RgbImage::from_pixel(1280, 720, Rgb([0, 166, 81]));
    for &n in &[1, 10, 40] {
        let pipeline = FramePipeline::new(
            &config,
            Arc::new(StubDetector::new(cans(n))),
            Arc::new(AnalyticsMetrics::new()),
        );
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            let mut tracker = config.tracking.build_tracker();
            b.iter(|| pipeline.process(black_box(&frame), "bench", &mut tracker))
        });
    }
    group.finish();
}

fn bench_downscale(c: &mut Criterion) {
    let config = AnalyticsConfig::default();
    let pipeline = FramePipeline::new(
        &config,
        Arc::new(StubDetector::new(cans(5))),
        Arc::new(AnalyticsMetrics::new()),
    );
    let frame = RgbImage::from_pixel(3840, 2160, Rgb([30, 30, 30]));
    let mut tracker = config.tracking.build_tracker();

    let mut group = c.benchmark_group("process_frame_4k");
    group.sample_size(10);
    group.bench_function("resize_and_process", |b| {
        b.iter(|| pipeline.process(black_box(&frame), "bench", &mut tracker))
    });
    group.finish();
}

criterion_group!(benches, bench_process_frame, bench_downscale);
criterion_main!(benches);
