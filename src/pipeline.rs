//! Computed decode pipeline: luminance to decoded symbols.
use tracing::trace;

use crate::decoder::{QrDecoder, sampler::sample_grid};
use crate::detector::finder::FinderDetector;
use crate::detector::grouping::{FinderTriple, group_finder_patterns};
use crate::models::{BitMatrix, QrCode};
use crate::utils::binarization::{adaptive_binarize, otsu_binarize};

/// Images at least this wide or tall start with adaptive binarization
pub const ADAPTIVE_MIN_SIDE: usize = 800;
/// Adaptive binarization window in pixels
pub const ADAPTIVE_WINDOW: usize = 31;

type Binarizer = fn(&[u8], usize, usize) -> BitMatrix;

fn adaptive(gray: &[u8], width: usize, height: usize) -> BitMatrix {
    adaptive_binarize(gray, width, height, ADAPTIVE_WINDOW)
}

/// Primary binarizer for the image size, then the other one
fn binarizers(width: usize, height: usize) -> [Binarizer; 2] {
    if width >= ADAPTIVE_MIN_SIDE || height >= ADAPTIVE_MIN_SIDE {
        [adaptive, otsu_binarize]
    } else {
        [otsu_binarize, adaptive]
    }
}

/// Decode every symbol found in an 8-bit luminance image
pub fn detect_luma(gray: &[u8], width: usize, height: usize) -> Vec<QrCode> {
    if width == 0 || height == 0 || gray.len() < width * height {
        return Vec::new();
    }
    for binarize in binarizers(width, height) {
        let binary = binarize(gray, width, height);
        let codes = decode_binary(&binary);
        if !codes.is_empty() {
            return codes;
        }
    }
    Vec::new()
}

/// Decode every symbol in a binarized image
pub fn decode_binary(binary: &BitMatrix) -> Vec<QrCode> {
    let patterns = FinderDetector::detect(binary);
    trace!(patterns = patterns.len(), "finder patterns");
    if patterns.len() < 3 {
        return Vec::new();
    }

    let mut used: Vec<usize> = Vec::new();
    let mut results: Vec<QrCode> = Vec::new();
    for triple in group_finder_patterns(&patterns) {
        if triple.indices.iter().any(|i| used.contains(i)) {
            continue;
        }
        if let Some(code) = decode_triple(binary, &triple) {
            used.extend(triple.indices);
            results.push(code);
        }
    }
    results
}

/// Try the estimated dimension and its neighbours for one triple
pub fn decode_triple(binary: &BitMatrix, triple: &FinderTriple) -> Option<QrCode> {
    for dimension in triple.dimension_candidates() {
        let Some(grid) = sample_grid(binary, triple, dimension) else {
            continue;
        };
        match QrDecoder::decode(&grid) {
            Ok(symbol) => {
                return Some(QrCode {
                    content: symbol.payload.text,
                    data: symbol.payload.bytes,
                    version: symbol.version,
                    error_correction: symbol.ec_level,
                    mask_pattern: symbol.mask_pattern,
                    finders: [triple.top_left, triple.top_right, triple.bottom_left],
                    modules: grid,
                });
            }
            Err(reason) => trace!(dimension, %reason, "grid rejected"),
        }
    }
    None
}
