use std::f64::consts::PI;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use papertouch::fingertip::scan_peaks;
use papertouch::geometry::{dist_sq, polygon_centroid, smooth_polygon};
use papertouch::{EventLog, FingertipTracker, ShapeClassifier};

/// Noisy closed outline with five lobes, like a spread hand.
fn make_outline(n: usize, seed: u64) -> Vec<[f64; 2]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let t = 2.0 * PI * i as f64 / n as f64;
            let r = 120.0 + 60.0 * (5.0 * t).cos().max(0.0) + rng.gen_range(-2.0..2.0);
            [320.0 + r * t.cos(), 240.0 + r * t.sin()]
        })
        .collect()
}

fn make_hand_mask(width: u32, height: u32) -> GrayImage {
    let palm = [width as f64 * 0.5, height as f64 * 0.7];
    let palm_r = height as f64 * 0.12;
    GrayImage::from_fn(width, height, |x, y| {
        let (px, py) = (x as f64, y as f64);
        let in_palm = dist_sq([px, py], palm) <= palm_r * palm_r;
        let in_finger = (px - palm[0]).abs() <= 10.0 && py >= palm[1] - 2.5 * palm_r && py <= palm[1];
        if in_palm || in_finger {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

fn make_edge_sheet(width: u32, height: u32) -> GrayImage {
    let mut img = GrayImage::new(width, height);
    for (x, y, p) in img.enumerate_pixels_mut() {
        let (px, py) = (x as f64, y as f64);
        let dot = dist_sq([px, py], [100.0, 100.0]) <= 30.0 * 30.0;
        let bar = (60.0..=360.0).contains(&px) && (220.0..=230.0).contains(&py);
        let switch = (300.0..=380.0).contains(&px) && (60.0..=100.0).contains(&py);
        if dot || bar || switch {
            *p = Luma([255]);
        }
    }
    img
}

fn bench_outline(c: &mut Criterion) {
    let outline = make_outline(1500, 3);

    c.bench_function("smooth_polygon_1500_k7", |b| {
        b.iter(|| black_box(smooth_polygon(black_box(&outline), 7).len()))
    });

    let center = polygon_centroid(&outline).unwrap_or([320.0, 240.0]);
    let distances: Vec<f64> = outline.iter().map(|&p| dist_sq(p, center)).collect();
    c.bench_function("scan_peaks_1500", |b| {
        b.iter(|| black_box(scan_peaks(black_box(&distances), 1600.0).len()))
    });
}

fn bench_fingertip(c: &mut Criterion) {
    let mask = make_hand_mask(640, 480);
    let reference = [[0.0, 0.0], [640.0, 0.0], [640.0, 480.0], [0.0, 480.0]];
    let mut tracker = FingertipTracker::default();

    c.bench_function("fingertip_detect_640x480", |b| {
        b.iter(|| black_box(tracker.detect(black_box(&mask), &reference)))
    });
}

fn bench_classify(c: &mut Criterion) {
    let edges = make_edge_sheet(518, 400);
    let classifier = ShapeClassifier::default();

    c.bench_function("classify_518x400", |b| {
        b.iter(|| {
            let mut log = EventLog::new();
            black_box(classifier.classify(black_box(&edges), &mut log).len())
        })
    });
}

criterion_group!(benches, bench_outline, bench_fingertip, bench_classify);
criterion_main!(benches);
