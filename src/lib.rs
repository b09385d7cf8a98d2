//! gatepass - visitor gate verification and payment QR codes
//!
//! Turns a photographed or dropped QR image into a visitor credential,
//! checks it with a remote verification authority and tracks the attempt
//! in a single-flight session. The same QR tables drive an encoder used to
//! render monthly payment codes.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gatepass::{CredentialValidator, DecodeEngine, FileInput, GateConfig, GateSession, HttpAuthority};
//!
//! # async fn run() -> gatepass::GateResult<()> {
//! let config = GateConfig::load_with_env(None)?;
//! let engine = Arc::new(DecodeEngine::standard(None, &config.decode));
//! let authority = Arc::new(HttpAuthority::new(&config.authority)?);
//! let session = GateSession::new(engine, CredentialValidator::new(authority));
//! let outcome = session.submit_file(FileInput::from_path("visitor.png")?).await;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

/// Image acquisition (file validation, decoding to RGBA)
pub mod acquire;
/// Configuration file and environment overrides
pub mod config;
/// QR decoding (sampling, format/version info, Reed-Solomon, data modes)
pub mod decoder;
/// QR detection (finder patterns and their grouping)
pub mod detector;
/// QR symbol encoder and rendering
pub mod encoder;
/// Ordered decode tiers
pub mod engine;
/// Error taxonomy
pub mod error;
/// Core data structures (QrCode, BitMatrix, Point, etc.)
pub mod models;
/// Payment URI and payment QR
pub mod payment;
/// Computed decode pipeline
pub mod pipeline;
/// Verification state machine
pub mod session;
/// Utility functions (grayscale, binarization, geometry)
pub mod utils;
/// Credential validation and the HTTP authority client
pub mod validator;

pub use acquire::{DecodedImage, FileInput, acquire};
pub use config::GateConfig;
pub use encoder::{QrSymbol, encode_text};
pub use engine::{BarcodeDetector, DecodeEngine, DecodeTier, DecodedCode};
pub use error::{GateError, GateResult};
pub use models::{BitMatrix, ECLevel, MaskPattern, Point, QrCode, Version};
pub use payment::{Amount, PaymentIntent, PaymentQr, payment_qr};
pub use session::{GateSession, ScanSession, ScanStatus, SubmitOutcome};
pub use validator::{
    CredentialValidator, HttpAuthority, VerificationAuthority, VerificationResult,
};

use utils::grayscale::rgba_to_grayscale;

/// Detect and decode every QR code in an RGBA image
///
/// # Arguments
/// * `rgba` - Raw RGBA bytes (4 bytes per pixel)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
pub fn detect(rgba: &[u8], width: usize, height: usize) -> Vec<QrCode> {
    if rgba.len() < width * height * 4 {
        return Vec::new();
    }
    let gray = rgba_to_grayscale(rgba, width, height);
    pipeline::detect_luma(&gray, width, height)
}

/// Detect QR codes from a pre-computed grayscale image
pub fn detect_from_grayscale(gray: &[u8], width: usize, height: usize) -> Vec<QrCode> {
    pipeline::detect_luma(gray, width, height)
}
