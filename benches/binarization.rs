use criterion::{Criterion, black_box, criterion_group, criterion_main};
use gatepass::utils::binarization::{adaptive_binarize, otsu_binarize, threshold_binarize};
use gatepass::utils::grayscale::rgba_to_grayscale;

/// Diagonal ramp with a noise term, so thresholds are not trivially flat
fn textured(width: usize, height: usize) -> Vec<u8> {
    (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            ((x + y) % 200 + (i * 31 % 55)) as u8
        })
        .collect()
}

fn bench_otsu_binarize(c: &mut Criterion) {
    for (w, h) in [(100, 100), (640, 480), (1920, 1080)] {
        let gray = textured(w, h);
        c.bench_function(&format!("otsu_binarize_{}x{}", w, h), |b| {
            b.iter(|| otsu_binarize(black_box(&gray), black_box(w), black_box(h)))
        });
    }
}

fn bench_adaptive_binarize(c: &mut Criterion) {
    let gray = textured(1920, 1080);
    c.bench_function("adaptive_binarize_1920x1080", |b| {
        b.iter(|| {
            adaptive_binarize(
                black_box(&gray),
                black_box(1920),
                black_box(1080),
                black_box(31),
            )
        })
    });
}

fn bench_threshold_binarize(c: &mut Criterion) {
    let gray = textured(640, 480);
    c.bench_function("threshold_binarize_640x480", |b| {
        b.iter(|| {
            threshold_binarize(
                black_box(&gray),
                black_box(640),
                black_box(480),
                black_box(128),
            )
        })
    });
}

fn bench_grayscale(c: &mut Criterion) {
    let rgba = vec![128u8; 1920 * 1080 * 4];
    c.bench_function("rgba_to_grayscale_1920x1080", |b| {
        b.iter(|| rgba_to_grayscale(black_box(&rgba), black_box(1920), black_box(1080)))
    });
}

criterion_group!(
    benches,
    bench_otsu_binarize,
    bench_adaptive_binarize,
    bench_threshold_binarize,
    bench_grayscale
);
criterion_main!(benches);
