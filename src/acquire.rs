//! Image acquisition: validate a user-supplied file and decode it to RGBA8.
use std::path::Path;

use tracing::debug;

use crate::error::{GateError, GateResult};
use crate::utils::grayscale::rgba_to_grayscale;

/// Media type used when the extension is unknown.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A file handed over by the operator (picker, drop or path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInput {
    pub name: Option<String>,
    /// Declared media type, e.g. `image/png`
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl FileInput {
    pub fn new(name: Option<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name,
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, declaring its media type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> GateResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| GateError::Input(format!("Could not read {}: {}", path.display(), e)))?;
        let media_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(media_type_for_extension)
            .unwrap_or(OCTET_STREAM);
        Ok(Self {
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            media_type: media_type.to_string(),
            bytes,
        })
    }

    /// Declared type is `image/*` (case-insensitive).
    pub fn is_image(&self) -> bool {
        self.media_type
            .trim()
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
    }
}

/// Media type for a file extension
pub fn media_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "ico" => "image/x-icon",
        "pbm" | "pgm" | "ppm" | "pnm" => "image/x-portable-anymap",
        _ => OCTET_STREAM,
    }
}

/// Decoded raster, RGBA8 row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// 8-bit luminance; translucent pixels are composited onto white first
    pub fn luma(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        if self.pixels.chunks_exact(4).all(|px| px[3] == 255) {
            return rgba_to_grayscale(&self.pixels, w, h);
        }
        let composited: Vec<u8> = self
            .pixels
            .chunks_exact(4)
            .flat_map(|px| {
                let a = px[3] as u32;
                let blend = |c: u8| ((c as u32 * a + 255 * (255 - a)) / 255) as u8;
                [blend(px[0]), blend(px[1]), blend(px[2]), 255]
            })
            .collect();
        rgba_to_grayscale(&composited, w, h)
    }
}

/// Validate the input and decode it. Rejections happen before any pixel work.
pub fn acquire(input: &FileInput) -> GateResult<DecodedImage> {
    if input.bytes.is_empty() {
        return Err(GateError::Input("No file received".into()));
    }
    if !input.is_image() {
        return Err(GateError::Input("Please use an image file".into()));
    }

    let image = image::load_from_memory(&input.bytes)?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(
        name = input.name.as_deref().unwrap_or("<unnamed>"),
        width, height, "image decoded"
    );
    Ok(DecodedImage::new(width, height, rgba.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(image: RgbaImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, ImageOutputFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_empty_file_rejected() {
        let input = FileInput::new(None, "image/png", Vec::new());
        assert_eq!(
            acquire(&input),
            Err(GateError::Input("No file received".into()))
        );
    }

    #[test]
    fn test_non_image_rejected_before_decoding() {
        let input = FileInput::new(Some("notes.txt".into()), "text/plain", b"hello".to_vec());
        assert_eq!(
            acquire(&input),
            Err(GateError::Input("Please use an image file".into()))
        );
    }

    #[test]
    fn test_media_type_case_insensitive() {
        let png = png_bytes(RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255])));
        let input = FileInput::new(None, "IMAGE/PNG", png);
        let decoded = acquire(&input).unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.pixels.len(), 3 * 2 * 4);
    }

    #[test]
    fn test_corrupt_image_is_decode_error() {
        let input = FileInput::new(None, "image/png", vec![0x89, b'P', b'N', b'G', 0, 1, 2]);
        assert!(matches!(acquire(&input), Err(GateError::Decode(_))));
    }

    #[test]
    fn test_transparent_pixels_read_white() {
        let image = DecodedImage::new(2, 1, vec![0, 0, 0, 0, 0, 0, 0, 255]);
        let luma = image.luma();
        assert!(luma[0] >= 254);
        assert_eq!(luma[1], 0);
    }

    #[test]
    fn test_from_path_declares_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Pass.PNG");
        std::fs::write(&path, b"data").unwrap();
        let input = FileInput::from_path(&path).unwrap();
        assert_eq!(input.media_type, "image/png");
        assert_eq!(input.name.as_deref(), Some("Pass.PNG"));

        let other = dir.path().join("pass.bin");
        std::fs::write(&other, b"data").unwrap();
        assert_eq!(FileInput::from_path(&other).unwrap().media_type, OCTET_STREAM);
    }
}
