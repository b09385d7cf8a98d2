//! Error correction block tables (Model 2, versions 1-40)
use crate::models::{ECLevel, Version};

// Index: [ec_level ordinal][version]
const ECC_CODEWORDS_PER_BLOCK: [[u8; 41]; 4] = [
    [
        0, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28,
        30, 30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        0, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ],
    [
        0, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30,
        30, 30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        0, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
];

const NUM_ERROR_CORRECTION_BLOCKS: [[u8; 41]; 4] = [
    [
        0, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12, 13,
        14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ],
    [
        0, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ],
    [
        0, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27, 29,
        34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ],
    [
        0, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32,
        35, 37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ],
];

/// Block structure of one (version, EC level) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    /// Number of RS blocks
    pub num_blocks: usize,
    /// EC codewords in every block
    pub ecc_per_block: usize,
    /// All codewords in the symbol (data + EC)
    pub total_codewords: usize,
}

impl BlockLayout {
    pub fn new(version: Version, level: ECLevel) -> Self {
        let v = version.number() as usize;
        Self {
            num_blocks: NUM_ERROR_CORRECTION_BLOCKS[level.ordinal()][v] as usize,
            ecc_per_block: ECC_CODEWORDS_PER_BLOCK[level.ordinal()][v] as usize,
            total_codewords: raw_data_modules(version) / 8,
        }
    }

    /// Data codewords across all blocks
    pub fn data_codewords(&self) -> usize {
        self.total_codewords - self.num_blocks * self.ecc_per_block
    }

    /// Blocks one codeword shorter than the rest; they come first
    pub fn num_short_blocks(&self) -> usize {
        self.num_blocks - self.total_codewords % self.num_blocks
    }

    /// Data codewords in a short block
    pub fn short_block_data_len(&self) -> usize {
        self.total_codewords / self.num_blocks - self.ecc_per_block
    }

    /// Data codeword count of block `index`
    pub fn block_data_len(&self, index: usize) -> usize {
        self.short_block_data_len() + usize::from(index >= self.num_short_blocks())
    }

    /// Split interleaved codewords back into blocks (data followed by EC)
    pub fn deinterleave(&self, codewords: &[u8]) -> Option<Vec<Vec<u8>>> {
        if codewords.len() != self.total_codewords {
            return None;
        }
        let mut blocks: Vec<Vec<u8>> = (0..self.num_blocks)
            .map(|i| Vec::with_capacity(self.block_data_len(i) + self.ecc_per_block))
            .collect();

        let mut iter = codewords.iter().copied();
        for i in 0..=self.short_block_data_len() {
            for (b, block) in blocks.iter_mut().enumerate() {
                if i < self.block_data_len(b) {
                    block.push(iter.next()?);
                }
            }
        }
        for _ in 0..self.ecc_per_block {
            for block in blocks.iter_mut() {
                block.push(iter.next()?);
            }
        }
        Some(blocks)
    }

    /// Interleave per-block data and EC codewords into transmission order
    pub fn interleave(&self, blocks: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_codewords);
        for i in 0..=self.short_block_data_len() {
            for (b, block) in blocks.iter().enumerate() {
                if i < self.block_data_len(b) {
                    out.push(block[i]);
                }
            }
        }
        for j in 0..self.ecc_per_block {
            for (b, block) in blocks.iter().enumerate() {
                out.push(block[self.block_data_len(b) + j]);
            }
        }
        out
    }
}

/// Modules available for codewords (and remainder bits) in a symbol
pub fn raw_data_modules(version: Version) -> usize {
    let v = version.number() as usize;
    let mut result = (16 * v + 128) * v + 64;
    if v >= 2 {
        let num_align = v / 7 + 2;
        result -= (25 * num_align - 10) * num_align - 55;
        if v >= 7 {
            result -= 36;
        }
    }
    result
}
