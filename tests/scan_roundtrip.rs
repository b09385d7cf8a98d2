//! End-to-end scans: encoder output rendered to image files, then acquired
//! and decoded through the engine like an operator upload.

use std::io::Cursor;

use gatepass::config::DecodeConfig;
use gatepass::encoder::encode_text;
use gatepass::payment::{Amount, PaymentIntent, payment_qr};
use gatepass::{
    DecodeEngine, ECLevel, FileInput, GateConfig, GateError, acquire, detect,
};
use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, Rgba, RgbaImage, imageops};

const VISITOR_TOKEN: &str = "VISITOR-1700000000-abc123";

fn encode_png(image: DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .expect("png encode");
    buffer.into_inner()
}

fn rendered(text: &str, level: ECLevel, scale: u32) -> GrayImage {
    encode_text(text, level)
        .expect("encode")
        .to_luma_image(scale, 4)
}

fn scan(png: Vec<u8>) -> Result<String, GateError> {
    let input = FileInput::new(Some("upload.png".into()), "image/png", png);
    let image = acquire(&input)?;
    DecodeEngine::standard(None, &DecodeConfig::default())
        .decode(&image)
        .map(|code| code.text)
}

#[test]
fn visitor_token_at_several_scales() {
    for scale in [2, 3, 5, 8] {
        let png = encode_png(DynamicImage::ImageLuma8(rendered(VISITOR_TOKEN, ECLevel::M, scale)));
        assert_eq!(scan(png).as_deref(), Ok(VISITOR_TOKEN), "scale {}", scale);
    }
}

#[test]
fn visitor_token_at_every_ec_level() {
    for level in [ECLevel::L, ECLevel::M, ECLevel::Q, ECLevel::H] {
        let png = encode_png(DynamicImage::ImageLuma8(rendered(VISITOR_TOKEN, level, 4)));
        assert_eq!(scan(png).as_deref(), Ok(VISITOR_TOKEN), "{:?}", level);
    }
}

#[test]
fn payment_uri_round_trips_through_an_image() {
    let config = GateConfig::default();
    let qr = payment_qr(&config.payment, Some(Amount::from_major(500).unwrap()), 3, 2025)
        .expect("payment qr")
        .expect("enabled");
    let png = qr.to_png(&config.payment).expect("png");

    let text = scan(png).expect("decoded");
    assert_eq!(text, qr.uri);

    let intent = PaymentIntent::from_uri(&text).expect("parse");
    assert_eq!(intent.payee_address, "mysociety@okicici");
    assert_eq!(intent.payee_name, "Smart Community");
    assert_eq!(intent.amount, Amount::from_major(500).unwrap());
    assert_eq!(intent.currency, "INR");
    assert_eq!(intent.note, "Rent payment for 03-2025");
}

#[test]
fn large_versions_with_version_blocks() {
    let long: String = (0..180).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    let symbol = encode_text(&long, ECLevel::H).expect("encode");
    assert!(symbol.version().number() >= 7);

    let png = encode_png(DynamicImage::ImageLuma8(symbol.to_luma_image(4, 4)));
    assert_eq!(scan(png), Ok(long));
}

#[test]
fn large_image_uses_adaptive_path() {
    // 29 + 8 modules at 24 px is well past the adaptive threshold
    let gray = rendered(VISITOR_TOKEN, ECLevel::Q, 24);
    assert!(gray.width() >= 800);
    let png = encode_png(DynamicImage::ImageLuma8(gray));
    assert_eq!(scan(png).as_deref(), Ok(VISITOR_TOKEN));
}

/// Re-light a rendered symbol with a left-to-right brightness ramp
fn shaded(gray: &GrayImage, lo: u32, hi: u32) -> GrayImage {
    let width = gray.width();
    GrayImage::from_fn(width, gray.height(), |x, y| {
        let light = lo + x * (hi - lo) / width;
        if gray.get_pixel(x, y)[0] == 0 {
            Luma([(light / 4) as u8])
        } else {
            Luma([light as u8])
        }
    })
}

#[test]
fn shaded_photo_decodes() {
    // Scale 24 crosses the adaptive threshold
    for scale in [5, 24] {
        let gray = rendered(VISITOR_TOKEN, ECLevel::Q, scale);
        for (lo, hi) in [(110, 250), (80, 250)] {
            let png = encode_png(DynamicImage::ImageLuma8(shaded(&gray, lo, hi)));
            assert_eq!(
                scan(png).as_deref(),
                Ok(VISITOR_TOKEN),
                "scale {} ramp {}..{}",
                scale,
                lo,
                hi
            );
        }
    }
}

#[test]
fn rotated_symbols_decode() {
    let gray = rendered(VISITOR_TOKEN, ECLevel::M, 5);
    for rotated in [
        imageops::rotate90(&gray),
        imageops::rotate180(&gray),
        imageops::rotate270(&gray),
    ] {
        let png = encode_png(DynamicImage::ImageLuma8(rotated));
        assert_eq!(scan(png).as_deref(), Ok(VISITOR_TOKEN));
    }
}

#[test]
fn mirrored_symbol_decodes() {
    let gray = imageops::flip_horizontal(&rendered(VISITOR_TOKEN, ECLevel::M, 5));
    let png = encode_png(DynamicImage::ImageLuma8(gray));
    assert_eq!(scan(png).as_deref(), Ok(VISITOR_TOKEN));
}

#[test]
fn low_contrast_colours() {
    let gray = rendered(VISITOR_TOKEN, ECLevel::M, 5);
    let tinted = RgbaImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] == 0 {
            Rgba([40, 50, 90, 255])
        } else {
            Rgba([200, 205, 190, 255])
        }
    });
    let png = encode_png(DynamicImage::ImageRgba8(tinted));
    assert_eq!(scan(png).as_deref(), Ok(VISITOR_TOKEN));
}

#[test]
fn transparent_background_is_read_as_white() {
    // Light modules are fully transparent black pixels
    let gray = rendered(VISITOR_TOKEN, ECLevel::M, 5);
    let overlay = RgbaImage::from_fn(gray.width(), gray.height(), |x, y| {
        let alpha = if gray.get_pixel(x, y)[0] == 0 { 255 } else { 0 };
        Rgba([0, 0, 0, alpha])
    });
    let png = encode_png(DynamicImage::ImageRgba8(overlay));
    assert_eq!(scan(png).as_deref(), Ok(VISITOR_TOKEN));
}

#[test]
fn symbol_on_a_larger_canvas() {
    let symbol = rendered(VISITOR_TOKEN, ECLevel::M, 4);
    let mut canvas = GrayImage::from_pixel(500, 380, Luma([235]));
    imageops::overlay(&mut canvas, &symbol, 130, 90);
    let png = encode_png(DynamicImage::ImageLuma8(canvas));
    assert_eq!(scan(png).as_deref(), Ok(VISITOR_TOKEN));
}

#[test]
fn two_symbols_in_one_image() {
    let left = rendered("FIRST", ECLevel::M, 4);
    let right = rendered("SECOND", ECLevel::M, 4);
    let mut canvas = GrayImage::from_pixel(left.width() + right.width() + 40, left.height(), Luma([255]));
    imageops::overlay(&mut canvas, &left, 0, 0);
    imageops::overlay(&mut canvas, &right, (left.width() + 40) as i64, 0);

    let rgba: Vec<u8> = canvas
        .pixels()
        .flat_map(|p| [p[0], p[0], p[0], 255])
        .collect();
    let mut found: Vec<String> = detect(&rgba, canvas.width() as usize, canvas.height() as usize)
        .into_iter()
        .map(|code| code.content)
        .collect();
    found.sort();
    assert_eq!(found, vec!["FIRST".to_string(), "SECOND".to_string()]);
}

#[test]
fn blank_image_is_no_code_found() {
    let png = encode_png(DynamicImage::ImageLuma8(GrayImage::from_pixel(300, 200, Luma([255]))));
    assert_eq!(scan(png), Err(GateError::NoCodeFound));
}

#[test]
fn corrupt_bytes_are_a_decode_error() {
    let mut png = encode_png(DynamicImage::ImageLuma8(rendered("X", ECLevel::L, 2)));
    png.truncate(20);
    assert!(matches!(scan(png), Err(GateError::Decode(_))));
}

#[test]
fn jpeg_photo_of_a_symbol() {
    let gray = rendered(VISITOR_TOKEN, ECLevel::M, 6);
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut buffer, ImageOutputFormat::Jpeg(90))
        .expect("jpeg encode");
    let input = FileInput::new(None, "image/jpeg", buffer.into_inner());
    let image = acquire(&input).expect("acquire");
    let code = DecodeEngine::default().decode(&image).expect("decode");
    assert_eq!(code.text, VISITOR_TOKEN);
    assert_eq!(code.tier, "computed");
}
