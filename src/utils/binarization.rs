/// Binarization of luminance images. Output `true` = dark.
use crate::models::BitMatrix;

/// Side of the square blocks used by `adaptive_binarize`
const BLOCK_SIZE: usize = 8;
/// Blocks whose min-max spread is at most this are treated as flat
const MIN_DYNAMIC_RANGE: u8 = 24;

/// Binarize with Otsu's global threshold
pub fn otsu_binarize(gray: &[u8], width: usize, height: usize) -> BitMatrix {
    threshold_binarize(gray, width, height, otsu_threshold(gray))
}

/// Otsu's threshold: pixels strictly below it are dark
pub fn otsu_threshold(gray: &[u8]) -> u8 {
    let mut histogram = [0u64; 256];
    for &pixel in gray {
        histogram[pixel as usize] += 1;
    }

    let total = gray.len() as f64;
    if total == 0.0 {
        return 128;
    }
    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    // Split is "value < threshold" vs the rest, so threshold t puts bins 0..t in the dark class
    let mut dark_count = 0.0f64;
    let mut dark_sum = 0.0f64;
    let mut best_variance = -1.0f64;
    let mut best_threshold = 128u8;

    for t in 1..=255usize {
        dark_count += histogram[t - 1] as f64;
        dark_sum += (t - 1) as f64 * histogram[t - 1] as f64;
        let light_count = total - dark_count;
        if dark_count == 0.0 || light_count == 0.0 {
            continue;
        }
        let dark_mean = dark_sum / dark_count;
        let light_mean = (sum_all - dark_sum) / light_count;
        let variance = dark_count * light_count * (dark_mean - light_mean).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// Simple global threshold binarization
pub fn threshold_binarize(gray: &[u8], width: usize, height: usize, threshold: u8) -> BitMatrix {
    let mut binary = BitMatrix::new(width, height);
    for y in 0..height {
        let row = &gray[y * width..(y + 1) * width];
        for (x, &value) in row.iter().enumerate() {
            if value < threshold {
                binary.set(x, y, true);
            }
        }
    }
    binary
}

/// Adaptive binarization over 8x8 blocks.
///
/// Each block gets a black point: its mean when it has contrast, otherwise
/// half its minimum (assumed light), or the black point carried from the
/// blocks above and to the left when it is darker than those. A pixel is dark
/// when it is at or below the mean black point of the surrounding blocks,
/// which span roughly `window` pixels (at least 5x5 blocks).
pub fn adaptive_binarize(gray: &[u8], width: usize, height: usize, window: usize) -> BitMatrix {
    let mut binary = BitMatrix::new(width, height);
    if width == 0 || height == 0 {
        return binary;
    }

    let blocks_x = width.div_ceil(BLOCK_SIZE);
    let blocks_y = height.div_ceil(BLOCK_SIZE);
    let black_points = block_black_points(gray, width, height, blocks_x, blocks_y);
    let radius = (window / (2 * BLOCK_SIZE)).max(2);

    for by in 0..blocks_y {
        let y_range = by.saturating_sub(radius)..(by + radius + 1).min(blocks_y);
        for bx in 0..blocks_x {
            let x_range = bx.saturating_sub(radius)..(bx + radius + 1).min(blocks_x);
            let mut sum = 0u32;
            let mut count = 0u32;
            for ny in y_range.clone() {
                for nx in x_range.clone() {
                    sum += black_points[ny * blocks_x + nx] as u32;
                    count += 1;
                }
            }
            let threshold = sum / count;

            let (x0, x1) = block_span(bx, blocks_x, width);
            let (y0, y1) = block_span(by, blocks_y, height);
            for y in y0..y1 {
                for x in x0..x1 {
                    if gray[y * width + x] as u32 <= threshold {
                        binary.set(x, y, true);
                    }
                }
            }
        }
    }

    binary
}

/// Pixel range owned by a block; the last block absorbs the remainder
fn block_span(index: usize, blocks: usize, extent: usize) -> (usize, usize) {
    let start = index * BLOCK_SIZE;
    let end = if index + 1 == blocks { extent } else { start + BLOCK_SIZE };
    (start, end)
}

fn block_black_points(
    gray: &[u8],
    width: usize,
    height: usize,
    blocks_x: usize,
    blocks_y: usize,
) -> Vec<u8> {
    let mut points = vec![0u8; blocks_x * blocks_y];
    for by in 0..blocks_y {
        let (y0, y1) = block_span(by, blocks_y, height);
        for bx in 0..blocks_x {
            let (x0, x1) = block_span(bx, blocks_x, width);

            let mut sum = 0u32;
            let mut min = u8::MAX;
            let mut max = u8::MIN;
            for y in y0..y1 {
                for &value in &gray[y * width + x0..y * width + x1] {
                    sum += value as u32;
                    min = min.min(value);
                    max = max.max(value);
                }
            }

            let point = if max - min > MIN_DYNAMIC_RANGE {
                (sum / ((x1 - x0) * (y1 - y0)) as u32) as u8
            } else {
                let mut point = min / 2;
                if bx > 0 && by > 0 {
                    let carried = (points[(by - 1) * blocks_x + bx] as u32
                        + 2 * points[by * blocks_x + bx - 1] as u32
                        + points[(by - 1) * blocks_x + bx - 1] as u32)
                        / 4;
                    if (min as u32) < carried {
                        point = carried as u8;
                    }
                }
                point
            };
            points[by * blocks_x + bx] = point;
        }
    }
    points
}
