//! Version information (versions 7-40): BCH(18,6) encoding and decoding
use crate::models::{BitMatrix, Version};

const VERSION_GENERATOR: u32 = 0x1F25;
const MAX_VERSION_ERRORS: u32 = 3;

/// 18-bit version codeword
pub fn encode_version_bits(version: Version) -> u32 {
    let v = version.number() as u32;
    let mut rem = v;
    for _ in 0..12 {
        rem = (rem << 1) ^ ((rem >> 11) * VERSION_GENERATOR);
    }
    (v << 12) | rem
}

/// Write both version blocks (no-op below version 7)
pub fn place_version(matrix: &mut BitMatrix, version: Version) {
    if version.number() < 7 {
        return;
    }
    let bits = encode_version_bits(version);
    let size = matrix.width();
    for i in 0..18 {
        let dark = (bits >> i) & 1 == 1;
        let a = size - 11 + i % 3;
        let b = i / 3;
        matrix.set(a, b, dark);
        matrix.set(b, a, dark);
    }
}

/// Read both version blocks and return the nearest version, if within correction range
pub fn extract_version(matrix: &BitMatrix) -> Option<Version> {
    let size = matrix.width();
    if size < 45 {
        return None;
    }
    let mut top_right = 0u32;
    let mut bottom_left = 0u32;
    for i in 0..18 {
        let a = size - 11 + i % 3;
        let b = i / 3;
        top_right |= (matrix.get(a, b) as u32) << i;
        bottom_left |= (matrix.get(b, a) as u32) << i;
    }

    Version::all()
        .filter(|v| v.number() >= 7)
        .flat_map(|v| {
            let codeword = encode_version_bits(v);
            [top_right, bottom_left]
                .into_iter()
                .map(move |copy| ((codeword ^ copy).count_ones(), v))
        })
        .min_by_key(|(distance, _)| *distance)
        .filter(|(distance, _)| *distance <= MAX_VERSION_ERRORS)
        .map(|(_, v)| v)
}
