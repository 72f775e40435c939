//! Benchmarks for colour extraction and brand matching

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use stream_analytics::config::{BrandConfig, KMeansSettings, SponsorConfig};
use stream_analytics::{extract_colors, match_colors, BrandMatcher, Color, SponsorAnalyzer};
use stream_analytics::{Bbox, Detection};

fn noisy_pixels(n: usize) -> Vec<Color> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..n)
        .map(|_| match rng.gen_range(0..3) {
            0 => [0, 166, 81],
            1 => [0, 0, 0],
            _ => [rng.gen(), rng.gen(), rng.gen()],
        })
        .collect()
}

fn bench_extract_colors(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_colors_by_region_size");
    let settings = KMeansSettings::default();

    for &side in &[16_usize, 64, 160] {
        let pixels = noisy_pixels(side * side);
        group.bench_with_input(BenchmarkId::from_parameter(side), &pixels, |b, pixels| {
            b.iter(|| extract_colors(black_box(pixels), 3, &settings))
        });
    }
    group.finish();
}

fn bench_match_colors(c: &mut Criterion) {
    let colors: Vec<Color> = vec![[10, 150, 90], [5, 5, 5], [200, 200, 200], [0, 45, 156], [255, 0, 0]];
    let brand: Vec<Color> = vec![[0, 166, 81], [0, 0, 0]];
    c.bench_function("match_colors_5x2", |b| {
        b.iter(|| match_colors(black_box(&colors), black_box(&brand)))
    });
}

fn bench_detect_brands(c: &mut Criterion) {
    let matcher = BrandMatcher::new(&BrandConfig::default());
    let frame = RgbImage::from_fn(640, 480, |x, y| {
        if (x / 40 + y / 40) % 2 == 0 {
            Rgb([0, 166, 81])
        } else {
            Rgb([0, 0, 0])
        }
    });
    let detections: Vec<Detection> = (0..12)
        .map(|i| {
            let x = (i % 6) as f32 * 100.0;
            let y = (i / 6) as f32 * 200.0;
            Detection::new(Bbox::new(x, y, x + 60.0, y + 120.0), 0.9, 0, "can")
        })
        .collect();

    c.bench_function("detect_brands_12_cans", |b| {
        b.iter(|| matcher.detect_brands(black_box(&frame), black_box(&detections)))
    });
}

fn bench_sponsor_scan(c: &mut Criterion) {
    let analyzer = SponsorAnalyzer::new(SponsorConfig::default());
    let frame = RgbImage::from_pixel(640, 360, Rgb([30, 215, 96]));
    let mut group = c.benchmark_group("sponsor_scan");
    group.sample_size(20);
    group.bench_function("colour_only", |b| b.iter(|| analyzer.analyze(black_box(&frame), None)));
    group.bench_function("with_text", |b| {
        b.iter(|| analyzer.analyze(black_box(&frame), Some("monster energy giveaway on twitch")))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_extract_colors,
    bench_match_colors,
    bench_detect_brands,
    bench_sponsor_scan
);
criterion_main!(benches);
