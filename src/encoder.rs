//! QR symbol encoder (byte mode) and rendering.
//!
//! Picks the smallest version that fits, builds EC blocks, places codewords
//! in the same order the decoder reads them and keeps the mask with the
//! lowest penalty score.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma};

use crate::decoder::format::FormatInfo;
use crate::decoder::function_mask::{FunctionMask, alignment_centers};
use crate::decoder::payload::{char_count_bits, mode};
use crate::decoder::reed_solomon::{compute_ecc, generator_poly};
use crate::decoder::tables::BlockLayout;
use crate::decoder::version::place_version;
use crate::error::{GateError, GateResult};
use crate::models::{BitMatrix, ECLevel, MaskPattern, Version};

const PAD_BYTES: [u8; 2] = [0xEC, 0x11];

const PENALTY_N1: usize = 3;
const PENALTY_N2: usize = 3;
const PENALTY_N3: usize = 40;
const PENALTY_N4: usize = 10;

/// An encoded QR symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrSymbol {
    modules: BitMatrix,
    version: Version,
    ec_level: ECLevel,
    mask_pattern: MaskPattern,
}

impl QrSymbol {
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn ec_level(&self) -> ECLevel {
        self.ec_level
    }

    pub fn mask_pattern(&self) -> MaskPattern {
        self.mask_pattern
    }

    /// Width in modules
    pub fn size(&self) -> usize {
        self.modules.width()
    }

    /// Module at column `x`, row `y` (true = dark)
    pub fn module(&self, x: usize, y: usize) -> bool {
        self.modules.get(x, y)
    }

    pub fn modules(&self) -> &BitMatrix {
        &self.modules
    }

    /// Grayscale raster with `scale` pixels per module and a light border of `quiet_zone` modules
    pub fn to_luma_image(&self, scale: u32, quiet_zone: u32) -> GrayImage {
        let scale = scale.max(1);
        let side = (self.size() as u32 + 2 * quiet_zone) * scale;
        GrayImage::from_fn(side, side, |px, py| {
            let mx = (px / scale) as i64 - quiet_zone as i64;
            let my = (py / scale) as i64 - quiet_zone as i64;
            let dark = mx >= 0 && my >= 0 && self.module(mx as usize, my as usize);
            Luma([if dark { 0 } else { 255 }])
        })
    }

    /// PNG bytes of [`QrSymbol::to_luma_image`]
    pub fn to_png(&self, scale: u32, quiet_zone: u32) -> GateResult<Vec<u8>> {
        let image = DynamicImage::ImageLuma8(self.to_luma_image(scale, quiet_zone));
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageOutputFormat::Png)
            .map_err(|e| GateError::Environment(format!("Could not render QR image: {}", e)))?;
        Ok(buffer.into_inner())
    }

    /// Two characters per module, with a two-module quiet zone
    pub fn to_text(&self) -> String {
        let quiet = 2usize;
        let side = self.size() + 2 * quiet;
        let mut out = String::with_capacity(side * (side * 6 + 1));
        for y in 0..side {
            for x in 0..side {
                let dark = x >= quiet
                    && y >= quiet
                    && self.module(x - quiet, y - quiet);
                out.push_str(if dark { "██" } else { "  " });
            }
            out.push('\n');
        }
        out
    }
}

/// Encode UTF-8 text in byte mode
pub fn encode_text(text: &str, ec_level: ECLevel) -> GateResult<QrSymbol> {
    encode_bytes(text.as_bytes(), ec_level)
}

/// Encode raw bytes in byte mode
pub fn encode_bytes(data: &[u8], ec_level: ECLevel) -> GateResult<QrSymbol> {
    let version = Version::all()
        .find(|&v| segment_bits(data.len(), v) <= BlockLayout::new(v, ec_level).data_codewords() * 8)
        .ok_or_else(|| {
            GateError::Input(format!("{} bytes do not fit in a QR code", data.len()))
        })?;
    Ok(encode_with_version(data, version, ec_level))
}

fn segment_bits(len: usize, version: Version) -> usize {
    let count_bits = char_count_bits(mode::BYTE, version);
    if len >= 1 << count_bits {
        return usize::MAX;
    }
    4 + count_bits + 8 * len
}

/// Encode into a fixed version; `data` must fit
pub(crate) fn encode_with_version(data: &[u8], version: Version, ec_level: ECLevel) -> QrSymbol {
    let layout = BlockLayout::new(version, ec_level);
    let data_codewords = build_data_codewords(data, version, layout.data_codewords());
    let codewords = add_error_correction(&data_codewords, &layout);

    let func = FunctionMask::new(version);
    let mut base = BitMatrix::square(version.size());
    draw_function_patterns(&mut base, version);
    for (i, (x, y)) in func.placement_order().into_iter().enumerate() {
        let dark = codewords
            .get(i / 8)
            .is_some_and(|cw| (cw >> (7 - i % 8)) & 1 == 1);
        base.set(x, y, dark);
    }

    let (modules, mask_pattern) = MaskPattern::all()
        .map(|mask| {
            let mut candidate = base.clone();
            apply_mask(&mut candidate, &func, mask);
            FormatInfo::new(ec_level, mask).place(&mut candidate);
            let score = penalty_score(&candidate);
            (score, candidate, mask)
        })
        .min_by_key(|(score, _, mask)| (*score, mask.bits()))
        .map(|(_, modules, mask)| (modules, mask))
        .unwrap_or_else(|| (base.clone(), MaskPattern::from_bits(0)));

    QrSymbol {
        modules,
        version,
        ec_level,
        mask_pattern,
    }
}

/// Mode, count, data, terminator, bit padding and pad codewords
fn build_data_codewords(data: &[u8], version: Version, capacity: usize) -> Vec<u8> {
    let mut bits = BitWriter::default();
    bits.push(mode::BYTE as u32, 4);
    bits.push(data.len() as u32, char_count_bits(mode::BYTE, version));
    for &byte in data {
        bits.push(byte as u32, 8);
    }

    let capacity_bits = capacity * 8;
    let terminator = (capacity_bits - bits.len()).min(4);
    bits.push(0, terminator);
    let mut codewords = bits.into_bytes();
    for pad in PAD_BYTES.iter().cycle() {
        if codewords.len() >= capacity {
            break;
        }
        codewords.push(*pad);
    }
    codewords
}

fn add_error_correction(data: &[u8], layout: &BlockLayout) -> Vec<u8> {
    let generator = generator_poly(layout.ecc_per_block);
    let mut offset = 0;
    let blocks: Vec<Vec<u8>> = (0..layout.num_blocks)
        .map(|b| {
            let len = layout.block_data_len(b);
            let mut block = data[offset..offset + len].to_vec();
            offset += len;
            block.extend(compute_ecc(&block, &generator));
            block
        })
        .collect();
    layout.interleave(&blocks)
}

fn draw_function_patterns(matrix: &mut BitMatrix, version: Version) {
    let size = version.size();
    for i in 0..size {
        let dark = i % 2 == 0;
        matrix.set(6, i, dark);
        matrix.set(i, 6, dark);
    }

    for (cx, cy) in [(3, 3), (size - 4, 3), (3, size - 4)] {
        // 9x9 with the light separator, clipped at the edges
        for dy in -4isize..=4 {
            for dx in -4isize..=4 {
                let (x, y) = (cx as isize + dx, cy as isize + dy);
                if x < 0 || y < 0 || x >= size as isize || y >= size as isize {
                    continue;
                }
                let ring = dx.abs().max(dy.abs());
                matrix.set(x as usize, y as usize, ring != 2 && ring != 4);
            }
        }
    }

    for (cx, cy) in alignment_centers(version) {
        for dy in -2isize..=2 {
            for dx in -2isize..=2 {
                let ring = dx.abs().max(dy.abs());
                matrix.set((cx as isize + dx) as usize, (cy as isize + dy) as usize, ring != 1);
            }
        }
    }

    place_version(matrix, version);
}

fn apply_mask(matrix: &mut BitMatrix, func: &FunctionMask, mask: MaskPattern) {
    let size = matrix.width();
    for y in 0..size {
        for x in 0..size {
            if !func.is_function(x, y) && mask.applies(x, y) {
                matrix.toggle(x, y);
            }
        }
    }
}

/// Sum of the four standard mask penalty rules
pub fn penalty_score(matrix: &BitMatrix) -> usize {
    let size = matrix.width();
    let rows = |y: usize| (0..size).map(move |x| matrix.get(x, y));
    let cols = |x: usize| (0..size).map(move |y| matrix.get(x, y));

    let mut score = 0;
    for i in 0..size {
        let row: Vec<bool> = rows(i).collect();
        let col: Vec<bool> = cols(i).collect();
        score += run_penalty(&row) + run_penalty(&col);
        score += finder_like_penalty(&row) + finder_like_penalty(&col);
    }

    for y in 0..size.saturating_sub(1) {
        for x in 0..size - 1 {
            let c = matrix.get(x, y);
            if c == matrix.get(x + 1, y) && c == matrix.get(x, y + 1) && c == matrix.get(x + 1, y + 1) {
                score += PENALTY_N2;
            }
        }
    }

    let total = size * size;
    let dark = matrix.count_dark();
    let five_percent_steps = (dark * 2).abs_diff(total) * 10 / total;
    score + five_percent_steps * PENALTY_N4
}

/// Rule 1: runs of five or more same-colored modules
fn run_penalty(line: &[bool]) -> usize {
    let mut score = 0;
    let mut run = 0;
    let mut previous = None;
    for &cell in line {
        if Some(cell) == previous {
            run += 1;
        } else {
            if run >= 5 {
                score += PENALTY_N1 + run - 5;
            }
            run = 1;
            previous = Some(cell);
        }
    }
    if run >= 5 {
        score += PENALTY_N1 + run - 5;
    }
    score
}

/// Rule 3: 1:1:3:1:1 dark-light pattern with four light modules on one side
fn finder_like_penalty(line: &[bool]) -> usize {
    const PATTERN: [bool; 7] = [true, false, true, true, true, false, true];
    let light = |from: isize, to: isize| {
        (from.max(0)..to.min(line.len() as isize)).all(|i| !line[i as usize])
    };
    let mut count = 0;
    for start in 0..line.len().saturating_sub(6) {
        if line[start..start + 7] == PATTERN {
            let s = start as isize;
            if light(s - 4, s) || light(s + 7, s + 11) {
                count += 1;
            }
        }
    }
    count * PENALTY_N3
}

/// MSB-first bit accumulator
#[derive(Default)]
struct BitWriter {
    bits: Vec<bool>,
}

impl BitWriter {
    fn push(&mut self, value: u32, count: usize) {
        for i in (0..count).rev() {
            self.bits.push((value >> i) & 1 == 1);
        }
    }

    fn len(&self) -> usize {
        self.bits.len()
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, &b)| acc | ((b as u8) << (7 - i)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::QrDecoder;

    #[test]
    fn test_smallest_version_chosen() {
        let symbol = encode_text("hello", ECLevel::M).unwrap();
        assert_eq!(symbol.version().number(), 1);
        assert_eq!(symbol.size(), 21);

        // 1-M holds 14 bytes in byte mode, 15 needs version 2
        assert_eq!(encode_text("abcdefghijklmn", ECLevel::M).unwrap().version().number(), 1);
        assert_eq!(encode_text("abcdefghijklmno", ECLevel::M).unwrap().version().number(), 2);
    }

    #[test]
    fn test_known_pad_sequence() {
        let codewords = build_data_codewords(b"A", Version::MIN, 19);
        // 0100 00000001 01000001 0000 -> 0x40 0x14 0x10, then pads
        assert_eq!(&codewords[..5], &[0x40, 0x14, 0x10, 0xEC, 0x11]);
        assert_eq!(codewords.len(), 19);
    }

    #[test]
    fn test_function_patterns_drawn() {
        let symbol = encode_text("gate", ECLevel::L).unwrap();
        let m = symbol.modules();
        // Finder corners, separator, timing, dark module
        assert!(m.get(0, 0) && m.get(6, 6) && m.get(3, 3));
        assert!(!m.get(7, 0) && !m.get(1, 1));
        assert!(m.get(8, 6) && !m.get(9, 6));
        assert!(m.get(8, symbol.size() - 8));
    }

    #[test]
    fn test_grid_round_trip_all_levels() {
        for level in [ECLevel::L, ECLevel::M, ECLevel::Q, ECLevel::H] {
            let text = "VISITOR-1700000000-abc123";
            let symbol = encode_text(text, level).unwrap();
            let decoded = QrDecoder::decode(symbol.modules()).unwrap();
            assert_eq!(decoded.payload.text, text);
            assert_eq!(decoded.ec_level, level);
            assert_eq!(decoded.mask_pattern, symbol.mask_pattern());
            assert_eq!(decoded.corrected, 0);
        }
    }

    #[test]
    fn test_grid_round_trip_large_versions() {
        let text: String = (0..300).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let symbol = encode_text(&text, ECLevel::Q).unwrap();
        assert!(symbol.version().number() >= 7);
        let decoded = QrDecoder::decode(symbol.modules()).unwrap();
        assert_eq!(decoded.payload.text, text);
        assert_eq!(decoded.version, symbol.version());
    }

    #[test]
    fn test_damaged_grid_is_corrected() {
        let symbol = encode_text("upi://pay?pa=mysociety@okicici", ECLevel::H).unwrap();
        let mut modules = symbol.modules().clone();
        // Flip a block of data modules in the lower right
        let size = modules.width();
        for y in size - 6..size - 2 {
            for x in size - 6..size - 2 {
                modules.toggle(x, y);
            }
        }
        let decoded = QrDecoder::decode(&modules).unwrap();
        assert_eq!(decoded.payload.text, "upi://pay?pa=mysociety@okicici");
        assert!(decoded.corrected > 0);
    }

    #[test]
    fn test_mirrored_grid_decodes() {
        let symbol = encode_text("mirror", ECLevel::M).unwrap();
        let decoded = QrDecoder::decode(&symbol.modules().transpose()).unwrap();
        assert_eq!(decoded.payload.text, "mirror");
        assert!(decoded.mirrored);
    }

    #[test]
    fn test_penalty_rules() {
        assert_eq!(run_penalty(&[true; 5]), 3);
        assert_eq!(run_penalty(&[true, true, true, true, true, true, false]), 4);
        assert_eq!(run_penalty(&[true, false, true, false]), 0);

        let mut line = vec![false; 4];
        line.extend([true, false, true, true, true, false, true]);
        assert_eq!(finder_like_penalty(&line), 40);
    }

    #[test]
    fn test_render_sizes() {
        let symbol = encode_text("x", ECLevel::L).unwrap();
        let image = symbol.to_luma_image(3, 4);
        assert_eq!(image.width(), (21 + 8) * 3);
        assert_eq!(image.get_pixel(0, 0).0[0], 255);
        assert_eq!(image.get_pixel(12, 12).0[0], 0);

        let png = symbol.to_png(2, 4).unwrap();
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);

        let text = symbol.to_text();
        assert_eq!(text.lines().count(), 25);
    }

    #[test]
    fn test_oversized_input_rejected() {
        let data = vec![b'x'; 3000];
        assert!(matches!(encode_bytes(&data, ECLevel::L), Err(GateError::Input(_))));
    }
}
