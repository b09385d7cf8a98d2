//! Symbol decoding after detection
//!
//! - Grid sampling with alignment refinement
//! - Format and version information (BCH)
//! - Unmasking and codeword placement order
//! - Reed-Solomon error correction
//! - Payload segment modes

/// Format information (EC level + mask)
pub mod format;
/// Function module map and codeword placement order
pub mod function_mask;
/// Segment parsing (numeric, alphanumeric, byte, kanji, ECI, FNC1, structured append)
pub mod payload;
/// Reed-Solomon over GF(256)
pub mod reed_solomon;
/// Perspective sampling of the module grid
pub mod sampler;
/// EC block tables and interleaving
pub mod tables;
/// Version information (versions 7-40)
pub mod version;

use format::FormatInfo;
use function_mask::FunctionMask;
use payload::{Payload, PayloadError, decode_payload};
use reed_solomon::{ReedSolomonDecoder, RsError};
use tables::BlockLayout;

use crate::models::{BitMatrix, ECLevel, MaskPattern, Version};

/// Result of decoding one module grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSymbol {
    pub payload: Payload,
    pub version: Version,
    pub ec_level: ECLevel,
    pub mask_pattern: MaskPattern,
    /// Codewords repaired by Reed-Solomon
    pub corrected: usize,
    /// The grid only decoded after transposing (mirror image)
    pub mirrored: bool,
}

/// Why a module grid did not decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("grid size {0} is not 17 + 4v")]
    Dimension(usize),
    #[error("format information unreadable")]
    Format,
    #[error("version information says {found}, grid is version {expected}")]
    VersionMismatch { expected: u8, found: u8 },
    #[error("codewords uncorrectable: {0:?}")]
    Codewords(RsError),
    #[error("payload malformed: {0:?}")]
    Payload(PayloadError),
}

pub struct QrDecoder;

impl QrDecoder {
    /// Decode a sampled grid, retrying its transpose for mirrored symbols
    pub fn decode(modules: &BitMatrix) -> Result<DecodedSymbol, DecodeFailure> {
        match Self::decode_oriented(modules) {
            Ok(symbol) => Ok(symbol),
            Err(first) => Self::decode_oriented(&modules.transpose())
                .map(|symbol| DecodedSymbol {
                    mirrored: true,
                    ..symbol
                })
                .map_err(|_| first),
        }
    }

    fn decode_oriented(modules: &BitMatrix) -> Result<DecodedSymbol, DecodeFailure> {
        let size = modules.width();
        let version = Version::from_size(size)
            .filter(|_| modules.height() == size)
            .ok_or(DecodeFailure::Dimension(size))?;

        let format = FormatInfo::extract(modules).ok_or(DecodeFailure::Format)?;
        if let Some(found) = version::extract_version(modules) {
            if found != version {
                return Err(DecodeFailure::VersionMismatch {
                    expected: version.number(),
                    found: found.number(),
                });
            }
        }

        let codewords = read_codewords(modules, version, format.mask_pattern);
        let layout = BlockLayout::new(version, format.ec_level);
        let blocks = layout
            .deinterleave(&codewords)
            .ok_or(DecodeFailure::Dimension(size))?;

        let rs = ReedSolomonDecoder::new(layout.ecc_per_block);
        let mut data = Vec::with_capacity(layout.data_codewords());
        let mut corrected = 0;
        for (index, mut block) in blocks.into_iter().enumerate() {
            corrected += rs.decode(&mut block).map_err(DecodeFailure::Codewords)?;
            data.extend_from_slice(&block[..layout.block_data_len(index)]);
        }

        let payload = decode_payload(&data, version).map_err(DecodeFailure::Payload)?;
        Ok(DecodedSymbol {
            payload,
            version,
            ec_level: format.ec_level,
            mask_pattern: format.mask_pattern,
            corrected,
            mirrored: false,
        })
    }
}

/// Unmask data modules and pack them into codewords in placement order
pub fn read_codewords(modules: &BitMatrix, version: Version, mask: MaskPattern) -> Vec<u8> {
    let layout_len = tables::raw_data_modules(version) / 8;
    let mut codewords = vec![0u8; layout_len];
    let func = FunctionMask::new(version);
    for (i, (x, y)) in func.placement_order().into_iter().take(layout_len * 8).enumerate() {
        if modules.get(x, y) ^ mask.applies(x, y) {
            codewords[i / 8] |= 0x80 >> (i % 8);
        }
    }
    codewords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_grids() {
        assert_eq!(
            QrDecoder::decode(&BitMatrix::square(22)),
            Err(DecodeFailure::Dimension(22))
        );
        assert_eq!(
            QrDecoder::decode(&BitMatrix::square(21)),
            Err(DecodeFailure::Format)
        );
    }
}
