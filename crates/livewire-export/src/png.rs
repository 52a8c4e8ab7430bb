//! PNG export of selection masks, cut-outs and cost maps.
//!
//! Returns encoded bytes; writing them anywhere is the caller's job.

use image::ExtendedColorType;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;

use livewire_core::{GrayImage, RgbaImage, SelectionMask};

/// Errors from the binary encoders.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The image encoder rejected the raster.
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

fn encode(raw: &[u8], width: u32, height: u32, color: ExtendedColorType) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(raw, width, height, color)?;
    Ok(buf)
}

/// Encode a grayscale raster (e.g. a cost map) as an 8-bit PNG.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails (e.g. a zero
/// width or height).
pub fn gray_to_png(image: &GrayImage) -> Result<Vec<u8>, ExportError> {
    encode(image.as_raw(), image.width(), image.height(), ExtendedColorType::L8)
}

/// Encode a selection mask as an 8-bit PNG (255 inside, 0 outside).
///
/// # Errors
///
/// Same conditions as [`gray_to_png`].
pub fn mask_to_png(mask: &SelectionMask) -> Result<Vec<u8>, ExportError> {
    gray_to_png(mask.image())
}

/// Encode an RGBA cut-out as a PNG with alpha.
///
/// # Errors
///
/// Same conditions as [`gray_to_png`].
pub fn rgba_to_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn gray_round_trips_through_decoder() {
        let image = GrayImage::from_fn(5, 3, |x, y| image::Luma([u8::try_from(x * 10 + y).unwrap()]));
        let bytes = gray_to_png(&image).unwrap();
        assert_eq!(bytes[..8], PNG_SIGNATURE);
        let decoded = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn rgba_keeps_alpha() {
        let image = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgba([1, 2, 3, 255])
            } else {
                image::Rgba([0, 0, 0, 0])
            }
        });
        let bytes = rgba_to_png(&image).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [1, 2, 3, 255]);
        assert_eq!(decoded.get_pixel(1, 0).0[3], 0);
    }

    #[test]
    fn empty_mask_encodes() {
        let mask = SelectionMask::empty(livewire_core::Dimensions::new(4, 4));
        assert!(mask_to_png(&mask).is_ok());
    }
}
