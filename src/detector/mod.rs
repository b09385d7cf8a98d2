//! Locating symbols in a binarized image
//!
//! - Finder pattern detection (the three corner squares)
//! - Grouping finder patterns into oriented triples

/// Finder pattern detection using 1:1:3:1:1 ratio scanning
pub mod finder;
/// Finder pattern triples and dimension estimates
pub mod grouping;
