/// Luminance conversion for decoded images.
///
/// Y = 0.299*R + 0.587*G + 0.114*B, computed as (76*R + 150*G + 29*B) >> 8.
/// Images above `PARALLEL_MIN_PIXELS` are converted row by row on the rayon pool.
use rayon::prelude::*;

const COEF_R: u32 = 76;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

/// Below this size a single thread is faster than splitting rows
const PARALLEL_MIN_PIXELS: usize = 512 * 512;

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32) >> 8).min(255) as u8
}

/// Convert interleaved pixels with `channels` bytes per pixel (3 = RGB, 4 = RGBA).
///
/// Alpha is ignored, so transparent regions keep whatever colour they carry.
/// Callers that care composite onto white first (see `acquire`).
pub fn to_luma(pixels: &[u8], width: usize, height: usize, channels: usize) -> Vec<u8> {
    debug_assert!(channels >= 3);
    debug_assert!(pixels.len() >= width * height * channels);

    let mut gray = vec![0u8; width * height];
    if width == 0 || height == 0 {
        return gray;
    }

    let convert_row = |(y, row): (usize, &mut [u8])| {
        let row_start = y * width * channels;
        for (x, out) in row.iter_mut().enumerate() {
            let idx = row_start + x * channels;
            *out = luma(pixels[idx], pixels[idx + 1], pixels[idx + 2]);
        }
    };

    if width * height >= PARALLEL_MIN_PIXELS {
        gray.par_chunks_mut(width).enumerate().for_each(convert_row);
    } else {
        gray.chunks_mut(width).enumerate().for_each(convert_row);
    }

    gray
}

/// Convert RGB bytes (3 per pixel)
pub fn rgb_to_grayscale(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    to_luma(rgb, width, height, 3)
}

/// Convert RGBA bytes (4 per pixel)
pub fn rgba_to_grayscale(rgba: &[u8], width: usize, height: usize) -> Vec<u8> {
    to_luma(rgba, width, height, 4)
}
