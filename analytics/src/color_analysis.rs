//! Dominant colour extraction and palette matching
//!
//! Colours are clustered with Lloyd's k-means in RGB space. Each restart is
//! seeded from `KMeansSettings::seed`, so a given region always yields the
//! same palette; the most compact restart wins.

use crate::config::KMeansSettings;
use crate::types::{Bbox, Color};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Largest RGB distance (black to white)
pub const MAX_RGB_DISTANCE: f32 = 441.672_94; // 255 * sqrt(3)

/// Pixels beyond this are subsampled with a fixed stride before clustering
pub const MAX_SAMPLE_PIXELS: usize = 20_000;

type Centroid = [f32; 3];

struct Clustering {
    centroids: Vec<Centroid>,
    sizes: Vec<usize>,
    compactness: f32,
}

fn dist_sq(a: &Centroid, b: &Centroid) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn nearest(point: &Centroid, centroids: &[Centroid]) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = dist_sq(point, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// k-means++ seeding: each further centre is drawn with probability
/// proportional to its squared distance from the centres chosen so far
fn seed_centroids(points: &[Centroid], k: usize, rng: &mut StdRng) -> Vec<Centroid> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);
    let mut weights: Vec<f32> = points.iter().map(|p| dist_sq(p, &centroids[0])).collect();

    while centroids.len() < k {
        let total: f32 = weights.iter().sum();
        let idx = if total > 0.0 {
            let mut target = rng.gen::<f32>() * total;
            weights
                .iter()
                .position(|&w| {
                    target -= w;
                    w > 0.0 && target <= 0.0
                })
                .or_else(|| weights.iter().rposition(|&w| w > 0.0))
                .unwrap_or(0)
        } else {
            // Every point sits on a centre already
            rng.gen_range(0..points.len())
        };
        let chosen = points[idx];
        centroids.push(chosen);
        for (w, p) in weights.iter_mut().zip(points) {
            *w = w.min(dist_sq(p, &chosen));
        }
    }
    centroids
}

fn run_attempt(points: &[Centroid], k: usize, settings: &KMeansSettings, attempt: usize) -> Clustering {
    let mut rng = StdRng::seed_from_u64(settings.seed.wrapping_add(attempt as u64));
    let mut centroids = seed_centroids(points, k, &mut rng);

    let mut labels = vec![0_usize; points.len()];
    let eps_sq = settings.epsilon * settings.epsilon;

    for _ in 0..settings.max_iterations {
        for (label, p) in labels.iter_mut().zip(points) {
            *label = nearest(p, &centroids).0;
        }

        let mut sums = vec![[0.0_f64; 3]; k];
        let mut counts = vec![0_usize; k];
        for (&label, p) in labels.iter().zip(points) {
            counts[label] += 1;
            for ch in 0..3 {
                sums[label][ch] += p[ch] as f64;
            }
        }

        let mut max_shift = 0.0_f32;
        for (i, centroid) in centroids.iter_mut().enumerate() {
            // Empty clusters keep their previous centre
            if counts[i] == 0 {
                continue;
            }
            let n = counts[i] as f64;
            let updated = [
                (sums[i][0] / n) as f32,
                (sums[i][1] / n) as f32,
                (sums[i][2] / n) as f32,
            ];
            max_shift = max_shift.max(dist_sq(centroid, &updated));
            *centroid = updated;
        }

        if max_shift <= eps_sq {
            break;
        }
    }

    let mut sizes = vec![0_usize; k];
    let mut compactness = 0.0_f32;
    for p in points {
        let (label, d) = nearest(p, &centroids);
        sizes[label] += 1;
        compactness += d;
    }

    Clustering {
        centroids,
        sizes,
        compactness,
    }
}

/// Cluster `pixels` into at most `k` representative colours.
///
/// Colours are ordered by cluster size, largest first; clusters that end up
/// empty are dropped. Returns an empty palette for an empty region.
pub fn extract_colors(pixels: &[Color], k: usize, settings: &KMeansSettings) -> Vec<Color> {
    if pixels.is_empty() || k == 0 {
        return Vec::new();
    }

    let stride = pixels.len().div_ceil(MAX_SAMPLE_PIXELS).max(1);
    let points: Vec<Centroid> = pixels
        .iter()
        .step_by(stride)
        .map(|c| [c[0] as f32, c[1] as f32, c[2] as f32])
        .collect();
    let k = k.min(points.len());

    let best = (0..settings.attempts.max(1))
        .into_par_iter()
        .map(|attempt| run_attempt(&points, k, settings, attempt))
        .reduce_with(|a, b| {
            // Ties resolved towards the earlier attempt for determinism
            if b.compactness < a.compactness {
                b
            } else {
                a
            }
        });

    let Some(best) = best else {
        return Vec::new();
    };

    let mut ranked: Vec<(usize, Centroid)> = best
        .sizes
        .into_iter()
        .zip(best.centroids)
        .filter(|(size, _)| *size > 0)
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    ranked
        .into_iter()
        .map(|(_, c)| c.map(|v| v.round().clamp(0.0, 255.0) as u8))
        .collect()
}

/// Collect the pixels of `frame` inside `bbox`.
///
/// Returns `None` when the box covers no whole pixel of the frame.
pub fn crop_pixels(frame: &RgbImage, bbox: &Bbox) -> Option<Vec<Color>> {
    if !bbox.is_valid() {
        return None;
    }
    let clipped = bbox.clip(frame.width() as f32, frame.height() as f32);
    let x0 = clipped.xmin.floor() as u32;
    let y0 = clipped.ymin.floor() as u32;
    let x1 = clipped.xmax.floor() as u32;
    let y1 = clipped.ymax.floor() as u32;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let mut pixels = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);
    for y in y0..y1 {
        for x in x0..x1 {
            pixels.push(frame.get_pixel(x, y).0);
        }
    }
    Some(pixels)
}

/// Every pixel of the frame, row-major
pub fn frame_pixels(frame: &RgbImage) -> Vec<Color> {
    frame.pixels().map(|p| p.0).collect()
}

/// Similarity of two colours in [0, 1]: 1 for identical, 0 at maximum distance
pub fn color_similarity(a: Color, b: Color) -> f32 {
    let dr = a[0] as f32 - b[0] as f32;
    let dg = a[1] as f32 - b[1] as f32;
    let db = a[2] as f32 - b[2] as f32;
    let distance = (dr * dr + dg * dg + db * db).sqrt();
    (1.0 - distance / MAX_RGB_DISTANCE).clamp(0.0, 1.0)
}

/// Best similarity over every (image colour, brand colour) pair.
///
/// 0 when either palette is empty.
pub fn match_colors(colors: &[Color], brand_colors: &[Color]) -> f32 {
    colors
        .iter()
        .flat_map(|&c| brand_colors.iter().map(move |&b| color_similarity(c, b)))
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    #[test]
    fn test_exact_match_is_one() {
        let brand = [[0, 166, 81], [0, 0, 0]];
        assert_abs_diff_eq!(match_colors(&[[0, 166, 81]], &brand), 1.0);
        assert_abs_diff_eq!(match_colors(&[[12, 40, 200], [0, 0, 0]], &brand), 1.0);
    }

    #[test]
    fn test_non_identical_below_one() {
        let score = match_colors(&[[0, 166, 82]], &[[0, 166, 81]]);
        assert!(score < 1.0);
        assert!(score > 0.99);
    }

    #[test]
    fn test_extremes_and_monotonic() {
        assert_abs_diff_eq!(color_similarity([0, 0, 0], [255, 255, 255]), 0.0, epsilon = 1e-6);
        let near = color_similarity([100, 100, 100], [110, 100, 100]);
        let mid = color_similarity([100, 100, 100], [150, 100, 100]);
        let far = color_similarity([100, 100, 100], [250, 100, 100]);
        assert!(near > mid && mid > far);
        assert_eq!(color_similarity([1, 2, 3], [4, 5, 6]), color_similarity([4, 5, 6], [1, 2, 3]));
    }

    #[test]
    fn test_empty_palettes() {
        assert_eq!(match_colors(&[], &[[1, 2, 3]]), 0.0);
        assert_eq!(match_colors(&[[1, 2, 3]], &[]), 0.0);
        assert!(extract_colors(&[], 3, &KMeansSettings::default()).is_empty());
    }

    #[test]
    fn test_uniform_region_single_colour() {
        let pixels = vec![[0, 166, 81]; 400];
        let colors = extract_colors(&pixels, 3, &KMeansSettings::default());
        assert!(!colors.is_empty());
        assert!(colors.iter().all(|&c| c == [0, 166, 81]));
    }

    #[test]
    fn test_two_colour_region_recovered() {
        let mut pixels = vec![[0, 166, 81]; 300];
        pixels.extend(vec![[0, 0, 0]; 100]);
        let colors = extract_colors(&pixels, 2, &KMeansSettings::default());
        assert_eq!(colors, vec![[0, 166, 81], [0, 0, 0]]);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let pixels: Vec<Color> = (0..900_u32)
            .map(|i| [(i % 256) as u8, ((i * 7) % 256) as u8, ((i * 13) % 256) as u8])
            .collect();
        let settings = KMeansSettings::default();
        let a = extract_colors(&pixels, 3, &settings);
        let b = extract_colors(&pixels, 3, &settings);
        assert_eq!(a, b);
        assert!(a.len() <= 3);
    }

    #[test]
    fn test_crop_pixels() {
        let mut frame = RgbImage::from_pixel(20, 20, Rgb([255, 255, 255]));
        for y in 5..10 {
            for x in 5..10 {
                frame.put_pixel(x, y, Rgb([0, 166, 81]));
            }
        }
        let roi = crop_pixels(&frame, &Bbox::new(5.0, 5.0, 10.0, 10.0)).unwrap();
        assert_eq!(roi.len(), 25);
        assert!(roi.iter().all(|&c| c == [0, 166, 81]));

        assert!(crop_pixels(&frame, &Bbox::new(30.0, 30.0, 40.0, 40.0)).is_none());
        assert!(crop_pixels(&frame, &Bbox::new(3.2, 3.0, 3.8, 9.0)).is_none());
    }
}
