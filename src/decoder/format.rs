//! Format information (EC level + mask): BCH(15,5) encoding, placement and
//! nearest-codeword decoding from both copies.
use crate::models::{BitMatrix, ECLevel, MaskPattern};

const FORMAT_GENERATOR: u32 = 0x537;
const FORMAT_XOR_MASK: u16 = 0x5412;
/// BCH(15,5) has minimum distance 7
const MAX_FORMAT_ERRORS: u32 = 3;

/// Decoded format information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub ec_level: ECLevel,
    pub mask_pattern: MaskPattern,
}

impl FormatInfo {
    pub fn new(ec_level: ECLevel, mask_pattern: MaskPattern) -> Self {
        Self {
            ec_level,
            mask_pattern,
        }
    }

    /// 15-bit masked codeword
    pub fn encode(&self) -> u16 {
        let data = ((self.ec_level.format_bits() as u32) << 3) | self.mask_pattern.bits() as u32;
        let mut rem = data;
        for _ in 0..10 {
            rem = (rem << 1) ^ ((rem >> 9) * FORMAT_GENERATOR);
        }
        (((data << 10) | rem) as u16) ^ FORMAT_XOR_MASK
    }

    /// Closest valid format for the given raw copies, if within correction range
    pub fn decode(copies: &[u16]) -> Option<Self> {
        let mut best: Option<(u32, FormatInfo)> = None;
        for bits in 0..4u8 {
            for mask in MaskPattern::all() {
                let candidate = FormatInfo::new(ECLevel::from_format_bits(bits), mask);
                let codeword = candidate.encode();
                for &copy in copies {
                    let distance = (codeword ^ copy).count_ones();
                    if best.is_none_or(|(d, _)| distance < d) {
                        best = Some((distance, candidate));
                    }
                }
            }
        }
        best.filter(|(d, _)| *d <= MAX_FORMAT_ERRORS)
            .map(|(_, info)| info)
    }

    /// Read both copies from a module grid and decode
    pub fn extract(matrix: &BitMatrix) -> Option<Self> {
        let (first, second) = read_copies(matrix);
        Self::decode(&[first, second])
    }

    /// Write both copies plus the dark module
    pub fn place(&self, matrix: &mut BitMatrix) {
        let bits = self.encode();
        let size = matrix.width();
        for (i, (x, y)) in first_copy_positions().into_iter().enumerate() {
            matrix.set(x, y, bit(bits, i));
        }
        for (i, (x, y)) in second_copy_positions(size).into_iter().enumerate() {
            matrix.set(x, y, bit(bits, i));
        }
        matrix.set(8, size - 8, true);
    }
}

fn bit(value: u16, i: usize) -> bool {
    (value >> i) & 1 == 1
}

/// Positions of bits 0..15 around the top-left finder
fn first_copy_positions() -> [(usize, usize); 15] {
    let mut positions = [(0, 0); 15];
    for (i, slot) in positions.iter_mut().enumerate() {
        *slot = match i {
            0..=5 => (8, i),
            6 => (8, 7),
            7 => (8, 8),
            8 => (7, 8),
            _ => (14 - i, 8),
        };
    }
    positions
}

/// Positions of bits 0..15 split between the other two finders
fn second_copy_positions(size: usize) -> [(usize, usize); 15] {
    let mut positions = [(0, 0); 15];
    for (i, slot) in positions.iter_mut().enumerate() {
        *slot = if i < 8 {
            (size - 1 - i, 8)
        } else {
            (8, size - 15 + i)
        };
    }
    positions
}

fn read_copies(matrix: &BitMatrix) -> (u16, u16) {
    let read = |positions: &[(usize, usize)]| {
        positions
            .iter()
            .enumerate()
            .fold(0u16, |acc, (i, &(x, y))| acc | ((matrix.get(x, y) as u16) << i))
    };
    (
        read(&first_copy_positions()),
        read(&second_copy_positions(matrix.width())),
    )
}
