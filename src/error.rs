//! Error taxonomy for scan, validation and payment QR attempts.
//!
//! Every error ends the current attempt only; the session returns to a
//! state where a new attempt can start.

use thiserror::Error;

/// Result type for gatepass operations.
pub type GateResult<T> = Result<T, GateError>;

/// Message shown when no decode tier finds a symbol.
pub const NO_CODE_FOUND: &str = "Could not detect a QR code in the selected image";

/// Message used when the authority gives no reason.
pub const VERIFICATION_FAILED: &str = "Verification failed";

/// Errors surfaced to the operator. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// Missing, empty or wrong-type input (file or manual token).
    #[error("{0}")]
    Input(String),

    /// Image bytes could not be decoded.
    #[error("{0}")]
    Decode(String),

    /// The image decoded but no tier found a symbol.
    #[error("Could not detect a QR code in the selected image")]
    NoCodeFound,

    /// The verification authority rejected the token or was unreachable.
    #[error("{0}")]
    Validation(String),

    /// A required capability is missing (no decode tier, PNG encoder failure).
    #[error("{0}")]
    Environment(String),

    /// Configuration file or environment could not be loaded.
    #[error("{0}")]
    Config(String),
}

impl GateError {
    /// Stable tag for logs and process exit codes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Decode(_) => "decode",
            Self::NoCodeFound => "no_code_found",
            Self::Validation(_) => "validation",
            Self::Environment(_) => "environment",
            Self::Config(_) => "config",
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Input(_) => 2,
            Self::Decode(_) => 3,
            Self::NoCodeFound => 4,
            Self::Validation(_) => 5,
            Self::Environment(_) => 6,
            Self::Config(_) => 7,
        }
    }

    /// Returns a short hint for the operator.
    pub fn suggestion(&self) -> &str {
        match self {
            Self::Input(_) => "Choose an image file or type the visitor code",
            Self::Decode(_) => "The file looks damaged; try another photo",
            Self::NoCodeFound => "Retake the photo with the whole code in frame",
            Self::Validation(_) => "Check the code with the visitor or try again",
            Self::Environment(_) => "Enable the built-in decoder or install a barcode detector",
            Self::Config(_) => "Fix the configuration file or GATEPASS_* variables",
        }
    }
}

impl From<image::ImageError> for GateError {
    fn from(e: image::ImageError) -> Self {
        Self::Decode(format!("Could not read image: {}", e))
    }
}
