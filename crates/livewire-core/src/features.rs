//! Per-pixel edge features: Sobel gradients, normalized gradient
//! magnitude, and Laplacian zero-crossings.
//!
//! Gradients and their magnitude are evaluated at every pixel with
//! samples outside the image read as 0 (zero padding), and the magnitude
//! is normalized by its maximum over the whole image. A bright image
//! therefore shows strong gradients along its border; the border cost
//! itself is pinned elsewhere. The Laplacian is evaluated on interior
//! pixels only, so the border keeps a zero-crossing factor of 1.

use crate::field::ScalarField;
use crate::types::Dimensions;

/// Minimum difference between the normalized Laplacian of a pixel and one
/// of its neighbours for the pixel to count as a zero-crossing.
pub const ZERO_CROSSING_THRESHOLD: f64 = 0.5;

/// Offsets of the 8 neighbours, clockwise starting from north.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// The feature maps a cost matrix is assembled from.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMaps {
    /// Horizontal Sobel derivative (positive when brightness increases
    /// to the right).
    pub gradient_x: ScalarField<f64>,
    /// Vertical Sobel derivative (positive when brightness increases
    /// downwards).
    pub gradient_y: ScalarField<f64>,
    /// Gradient magnitude normalized to `[0, 1]` over the whole image.
    pub gradient_magnitude: ScalarField<f64>,
    /// Zero-crossing cost factor: 0 at a zero-crossing, 1 elsewhere
    /// (including the border).
    pub zero_crossing: ScalarField<f64>,
}

impl FeatureMaps {
    /// Run every extraction step on a grayscale field.
    #[must_use]
    pub fn extract(gray: &ScalarField<f64>) -> Self {
        let (gradient_x, gradient_y) = sobel_gradients(gray);
        let gradient_magnitude = gradient_magnitude(&gradient_x, &gradient_y);
        let zero_crossing = zero_crossings(&laplacian(gray));
        Self {
            gradient_x,
            gradient_y,
            gradient_magnitude,
            zero_crossing,
        }
    }
}

/// Whether `(x, y)` is off the first/last row and column.
pub(crate) const fn is_interior(dims: Dimensions, x: u32, y: u32) -> bool {
    x > 0 && y > 0 && x + 1 < dims.width && y + 1 < dims.height
}

/// Sample with zero padding outside the image.
fn sample(gray: &ScalarField<f64>, x: i64, y: i64) -> f64 {
    match (u32::try_from(x), u32::try_from(y)) {
        (Ok(x), Ok(y)) if x < gray.width() && y < gray.height() => gray[(x, y)],
        _ => 0.0,
    }
}

/// Horizontal and vertical Sobel derivatives with zero padding.
///
/// Kernel weights are `i * (2 - |j|)` for x and `j * (2 - |i|)` for y,
/// with `(i, j)` the column/row offset in `-1..=1`.
#[must_use = "returns the (gx, gy) gradient fields"]
pub fn sobel_gradients(gray: &ScalarField<f64>) -> (ScalarField<f64>, ScalarField<f64>) {
    let dims = gray.dimensions();
    let mut gx = ScalarField::filled(dims, 0.0);
    let mut gy = ScalarField::filled(dims, 0.0);
    for y in 0..dims.height {
        for x in 0..dims.width {
            let mut sum_x = 0.0;
            let mut sum_y = 0.0;
            for j in -1_i64..=1 {
                for i in -1_i64..=1 {
                    let value = sample(gray, i64::from(x) + i, i64::from(y) + j);
                    #[allow(clippy::cast_precision_loss)]
                    {
                        sum_x += (i * (2 - j.abs())) as f64 * value;
                        sum_y += (j * (2 - i.abs())) as f64 * value;
                    }
                }
            }
            gx[(x, y)] = sum_x;
            gy[(x, y)] = sum_y;
        }
    }
    (gx, gy)
}

/// Gradient magnitude at every pixel, normalized by its maximum.
#[must_use = "returns the normalized magnitude field"]
pub fn gradient_magnitude(gx: &ScalarField<f64>, gy: &ScalarField<f64>) -> ScalarField<f64> {
    let mut magnitude = ScalarField::from_fn(gx.dimensions(), |x, y| gx[(x, y)].hypot(gy[(x, y)]));
    magnitude.normalize_by_max();
    magnitude
}

/// Absolute 4-neighbour Laplacian on interior pixels, normalized by its
/// maximum.
#[must_use = "returns the normalized Laplacian field"]
pub fn laplacian(gray: &ScalarField<f64>) -> ScalarField<f64> {
    let dims = gray.dimensions();
    let mut lap = ScalarField::from_fn(dims, |x, y| {
        if is_interior(dims, x, y) {
            let center = gray[(x, y)];
            let sum = gray[(x, y - 1)] + gray[(x, y + 1)] + gray[(x - 1, y)] + gray[(x + 1, y)];
            4.0f64.mul_add(-center, sum).abs()
        } else {
            0.0
        }
    });
    lap.normalize_by_max();
    lap
}

/// Zero-crossing factor from a normalized Laplacian.
///
/// An interior pixel whose value differs from any of its 8 neighbours by
/// more than [`ZERO_CROSSING_THRESHOLD`] gets 0 (cheap); everything else,
/// including the border, gets 1.
#[must_use = "returns the zero-crossing factor field"]
pub fn zero_crossings(laplacian: &ScalarField<f64>) -> ScalarField<f64> {
    let dims = laplacian.dimensions();
    ScalarField::from_fn(dims, |x, y| {
        if !is_interior(dims, x, y) {
            return 1.0;
        }
        let center = laplacian[(x, y)];
        let crossing = NEIGHBOR_OFFSETS.iter().any(|&(dx, dy)| {
            let nx = x.saturating_add_signed(dx);
            let ny = y.saturating_add_signed(dy);
            (laplacian[(nx, ny)] - center).abs() > ZERO_CROSSING_THRESHOLD
        });
        if crossing { 0.0 } else { 1.0 }
    })
}
