pub mod matrix;
pub mod point;
pub mod qr_code;

pub use matrix::BitMatrix;
pub use point::Point;
pub use qr_code::{ECLevel, MaskPattern, QrCode, Version};
