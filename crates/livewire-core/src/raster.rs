//! Image decoding and grayscale sampling.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) or an already decoded
//! [`DynamicImage`] and produces the floating-point grayscale field the
//! feature extractor works on.

use image::DynamicImage;

use crate::field::ScalarField;
use crate::types::{Dimensions, LivewireError};

/// Luma weights applied to the R, G and B channels of colour images.
pub const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`LivewireError::EmptyInput`] if `bytes` is empty.
/// Returns [`LivewireError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, LivewireError> {
    if bytes.is_empty() {
        return Err(LivewireError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Dimensions of a decoded image.
#[must_use]
pub fn dimensions(image: &DynamicImage) -> Dimensions {
    Dimensions::new(image.width(), image.height())
}

/// Convert an image to a grayscale field.
///
/// Images with three or more channels are reduced with
/// `0.299*R + 0.587*G + 0.114*B` (alpha ignored); one- and two-channel
/// images pass their luma channel through unchanged. Values are kept
/// unrounded, in 8-bit sample units.
#[must_use = "returns the grayscale field"]
pub fn grayscale(image: &DynamicImage) -> ScalarField<f64> {
    let dims = dimensions(image);
    if image.color().channel_count() >= 3 {
        let rgb = image.to_rgb8();
        ScalarField::from_fn(dims, |x, y| {
            let [r, g, b] = rgb.get_pixel(x, y).0;
            LUMA_WEIGHTS[0].mul_add(
                f64::from(r),
                LUMA_WEIGHTS[1].mul_add(f64::from(g), LUMA_WEIGHTS[2] * f64::from(b)),
            )
        })
    } else {
        let luma = image.to_luma8();
        ScalarField::from_fn(dims, |x, y| f64::from(luma.get_pixel(x, y).0[0]))
    }
}
