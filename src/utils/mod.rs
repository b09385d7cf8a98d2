//! Image helpers used ahead of detection
//!
//! - Luminance conversion (RGB/RGBA to gray)
//! - Binarization (Otsu and adaptive mean)
//! - Perspective transforms

pub mod binarization;
pub mod geometry;
pub mod grayscale;
