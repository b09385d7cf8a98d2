use criterion::{Criterion, black_box, criterion_group, criterion_main};
use gatepass::config::DecodeConfig;
use gatepass::encoder::encode_text;
use gatepass::{DecodeEngine, DecodedImage, ECLevel, detect};

fn rendered(text: &str, level: ECLevel, scale: u32) -> DecodedImage {
    let luma = encode_text(text, level)
        .expect("encode")
        .to_luma_image(scale, 4);
    let (w, h) = luma.dimensions();
    let pixels = luma.into_raw().into_iter().flat_map(|v| [v, v, v, 255]).collect();
    DecodedImage::new(w, h, pixels)
}

fn bench_detect_visitor_token(c: &mut Criterion) {
    let image = rendered("VISITOR-1700000000-abc123", ECLevel::M, 6);
    let (w, h) = (image.width as usize, image.height as usize);
    c.bench_function("detect_visitor_token", |b| {
        b.iter(|| detect(black_box(&image.pixels), black_box(w), black_box(h)))
    });
}

fn bench_detect_blank(c: &mut Criterion) {
    let rgba = vec![255u8; 640 * 480 * 4];
    c.bench_function("detect_blank_640x480", |b| {
        b.iter(|| detect(black_box(&rgba), black_box(640), black_box(480)))
    });
}

fn bench_engine_payment_uri(c: &mut Criterion) {
    let uri = "upi://pay?pa=mysociety%40okicici&pn=Smart%20Community&am=500&cu=INR&tn=Rent%20payment%20for%2003-2025";
    let image = rendered(uri, ECLevel::Q, 8);
    let engine = DecodeEngine::standard(None, &DecodeConfig::default());
    c.bench_function("engine_payment_uri", |b| {
        b.iter(|| engine.decode(black_box(&image)))
    });
}

fn bench_encode_payment_uri(c: &mut Criterion) {
    let uri = "upi://pay?pa=mysociety%40okicici&pn=Smart%20Community&am=500&cu=INR&tn=Rent%20payment%20for%2003-2025";
    c.bench_function("encode_payment_uri", |b| {
        b.iter(|| encode_text(black_box(uri), ECLevel::M))
    });
}

criterion_group!(
    benches,
    bench_detect_visitor_token,
    bench_detect_blank,
    bench_engine_payment_uri,
    bench_encode_payment_uri
);
criterion_main!(benches);
