//! QR decode engine: ordered decode tiers, first non-empty result wins.
//!
//! The native tier wraps a runtime-provided barcode detector. The computed
//! tier runs the built-in pipeline and is the fallback when the native one is
//! missing, does not support QR, or finds nothing.
use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use image::imageops::{self, FilterType};
use tracing::{debug, warn};

use crate::acquire::DecodedImage;
use crate::config::DecodeConfig;
use crate::error::{GateError, GateResult};
use crate::pipeline::detect_luma;

/// Barcode symbologies a native detector may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarcodeFormat {
    QrCode,
    Aztec,
    Code128,
    DataMatrix,
    Ean13,
    Pdf417,
    Other,
}

/// One barcode reported by a native detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedBarcode {
    pub raw_value: String,
    pub format: BarcodeFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorError(pub String);

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DetectorError {}

/// A barcode detection capability supplied by the host platform.
pub trait BarcodeDetector: Send + Sync {
    fn supported_formats(&self) -> Vec<BarcodeFormat>;

    fn detect(
        &self,
        image: &DecodedImage,
        formats: &[BarcodeFormat],
    ) -> Result<Vec<DetectedBarcode>, DetectorError>;
}

/// A way of turning an image into text.
pub trait DecodeTier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Checked on every decode, not cached.
    fn is_available(&self) -> bool;

    /// Trimmed, non-empty text or `None`.
    fn decode(&self, image: &DecodedImage) -> Option<String>;
}

/// Tier backed by an optional native detector.
#[derive(Clone, Default)]
pub struct NativeTier {
    detector: Option<Arc<dyn BarcodeDetector>>,
}

impl NativeTier {
    pub fn new(detector: Option<Arc<dyn BarcodeDetector>>) -> Self {
        Self { detector }
    }
}

impl DecodeTier for NativeTier {
    fn name(&self) -> &'static str {
        "native"
    }

    fn is_available(&self) -> bool {
        self.detector
            .as_ref()
            .is_some_and(|d| d.supported_formats().contains(&BarcodeFormat::QrCode))
    }

    fn decode(&self, image: &DecodedImage) -> Option<String> {
        let detector = self.detector.as_ref()?;
        match detector.detect(image, &[BarcodeFormat::QrCode]) {
            Ok(found) => found
                .into_iter()
                .next()
                .map(|barcode| barcode.raw_value.trim().to_string())
                .filter(|text| !text.is_empty()),
            Err(e) => {
                warn!(error = %e, "native barcode detection failed");
                None
            }
        }
    }
}

/// Tier running the built-in detection and decoding pipeline.
#[derive(Debug, Clone)]
pub struct ComputedTier {
    enabled: bool,
    max_dimension: Option<u32>,
}

impl ComputedTier {
    pub fn new(enabled: bool, max_dimension: Option<u32>) -> Self {
        Self {
            enabled,
            max_dimension,
        }
    }

    fn downscaled(&self, image: &DecodedImage) -> Option<DecodedImage> {
        let max = self.max_dimension?;
        let longest = image.width.max(image.height);
        if max == 0 || longest <= max {
            return None;
        }
        let scale = max as f64 / longest as f64;
        let width = ((image.width as f64 * scale).round() as u32).max(1);
        let height = ((image.height as f64 * scale).round() as u32).max(1);
        let source = RgbaImage::from_raw(image.width, image.height, image.pixels.clone())?;
        let resized = imageops::resize(&source, width, height, FilterType::Triangle);
        debug!(from = longest, to = max, "downscaled before decoding");
        Some(DecodedImage::new(width, height, resized.into_raw()))
    }
}

impl Default for ComputedTier {
    fn default() -> Self {
        Self::new(true, None)
    }
}

impl DecodeTier for ComputedTier {
    fn name(&self) -> &'static str {
        "computed"
    }

    fn is_available(&self) -> bool {
        self.enabled
    }

    fn decode(&self, image: &DecodedImage) -> Option<String> {
        let scaled = self.downscaled(image);
        let image = scaled.as_ref().unwrap_or(image);
        let gray = image.luma();
        detect_luma(&gray, image.width as usize, image.height as usize)
            .into_iter()
            .map(|code| code.content.trim().to_string())
            .find(|text| !text.is_empty())
    }
}

/// Text decoded from an image and the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCode {
    pub text: String,
    pub tier: &'static str,
}

/// Ordered decode tiers.
pub struct DecodeEngine {
    tiers: Vec<Box<dyn DecodeTier>>,
}

impl DecodeEngine {
    pub fn new(tiers: Vec<Box<dyn DecodeTier>>) -> Self {
        Self { tiers }
    }

    /// Native tier first, then the computed tier.
    pub fn standard(native: Option<Arc<dyn BarcodeDetector>>, config: &DecodeConfig) -> Self {
        Self::new(vec![
            Box::new(NativeTier::new(native)),
            Box::new(ComputedTier::new(config.computed_fallback, config.max_dimension)),
        ])
    }

    /// Names of the tiers usable right now, in order.
    pub fn available_tiers(&self) -> Vec<&'static str> {
        self.tiers
            .iter()
            .filter(|t| t.is_available())
            .map(|t| t.name())
            .collect()
    }

    pub fn decode(&self, image: &DecodedImage) -> GateResult<DecodedCode> {
        let mut attempted = 0usize;
        for tier in self.tiers.iter().filter(|t| t.is_available()) {
            attempted += 1;
            if let Some(text) = tier.decode(image) {
                debug!(tier = tier.name(), len = text.len(), "symbol decoded");
                return Ok(DecodedCode {
                    text,
                    tier: tier.name(),
                });
            }
            debug!(tier = tier.name(), "tier found nothing");
        }

        if attempted == 0 {
            return Err(GateError::Environment(
                "No QR decoder is available".to_string(),
            ));
        }
        Err(GateError::NoCodeFound)
    }
}

impl Default for DecodeEngine {
    fn default() -> Self {
        Self::standard(None, &DecodeConfig::default())
    }
}
