//! Per-pixel traversal cost synthesized from edge features.
//!
//! Low cost marks likely boundary pixels: strong gradient, Laplacian
//! zero-crossing and a gradient direction that agrees with the
//! neighbourhood. Interior cost is
//!
//! ```text
//! clamp(wZ * fZ + wG * (1 - magnitude) + wD * fD, 0, 1)
//! ```
//!
//! Border pixels cost exactly 1.0 and anything outside the image costs
//! [`OUT_OF_BOUNDS_COST`], so a path only hugs the border when it has no
//! interior alternative.

use std::f64::consts::SQRT_2;

use image::{DynamicImage, GrayImage, Luma};

use crate::features::{FeatureMaps, NEIGHBOR_OFFSETS, is_interior};
use crate::field::ScalarField;
use crate::raster;
use crate::types::{CostWeights, Dimensions, LivewireError, Pixel};

/// Cost reported for pixels outside the image.
pub const OUT_OF_BOUNDS_COST: f64 = f64::INFINITY;

/// Cost of every pixel on the first/last row and column.
pub const BORDER_COST: f64 = 1.0;

/// Multiplier applied to the target cost of a move between neighbours:
/// 1 for axis-aligned moves, sqrt(2) for diagonals, `None` otherwise.
#[must_use]
pub fn step_weight(from: Pixel, to: Pixel) -> Option<f64> {
    if !from.is_neighbor(to) {
        return None;
    }
    Some(if from.x != to.x && from.y != to.y { SQRT_2 } else { 1.0 })
}

/// Immutable feature maps plus the combined cost of one image.
///
/// Built once per image and shared read-only (`Arc<CostMatrix>`) by
/// every search and session on that image.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    weights: CostWeights,
    gradient_x: ScalarField<f64>,
    gradient_y: ScalarField<f64>,
    gradient_magnitude: ScalarField<f64>,
    zero_crossing: ScalarField<f64>,
    cost: ScalarField<f64>,
}

impl CostMatrix {
    /// Build the cost matrix of a decoded image.
    ///
    /// # Errors
    ///
    /// Returns [`LivewireError::InvalidDimensions`] for an image with a
    /// zero width or height, or [`LivewireError::InvalidConfig`] when a
    /// weight is negative or not finite.
    pub fn build(image: &DynamicImage, weights: CostWeights) -> Result<Self, LivewireError> {
        let dims = raster::dimensions(image);
        check_dimensions(dims)?;
        weights.validate()?;
        Self::from_grayscale(&raster::grayscale(image), weights)
    }

    /// Build from a precomputed grayscale field.
    ///
    /// # Errors
    ///
    /// Same conditions as [`build`](Self::build).
    pub fn from_grayscale(
        gray: &ScalarField<f64>,
        weights: CostWeights,
    ) -> Result<Self, LivewireError> {
        check_dimensions(gray.dimensions())?;
        weights.validate()?;
        Self::from_feature_maps(FeatureMaps::extract(gray), weights)
    }

    /// Assemble from externally supplied feature maps.
    ///
    /// # Errors
    ///
    /// Returns [`LivewireError::DimensionMismatch`] when the maps do not
    /// all share the size of `gradient_x`, plus the conditions of
    /// [`build`](Self::build).
    pub fn from_feature_maps(
        features: FeatureMaps,
        weights: CostWeights,
    ) -> Result<Self, LivewireError> {
        let expected = features.gradient_x.dimensions();
        check_dimensions(expected)?;
        weights.validate()?;
        for (name, actual) in [
            ("gradient_y", features.gradient_y.dimensions()),
            ("gradient_magnitude", features.gradient_magnitude.dimensions()),
            ("zero_crossing", features.zero_crossing.dimensions()),
        ] {
            if actual != expected {
                return Err(LivewireError::DimensionMismatch {
                    name,
                    expected,
                    actual,
                });
            }
        }

        let cost = combine(&features, weights);
        log::debug!(
            "built cost matrix {expected} (weights {:.2}/{:.2}/{:.2})",
            weights.zero_crossing,
            weights.gradient_magnitude,
            weights.gradient_direction,
        );
        let FeatureMaps {
            gradient_x,
            gradient_y,
            gradient_magnitude,
            zero_crossing,
        } = features;
        Ok(Self {
            weights,
            gradient_x,
            gradient_y,
            gradient_magnitude,
            zero_crossing,
            cost,
        })
    }

    /// Cost of entering `pixel`, or [`OUT_OF_BOUNDS_COST`] outside the
    /// image.
    #[must_use]
    pub fn cost(&self, pixel: Pixel) -> f64 {
        self.cost.at(pixel).unwrap_or(OUT_OF_BOUNDS_COST)
    }

    /// Cost of the move `from -> to`: `cost(to)` scaled by the step
    /// length. Infinite when the pixels are not neighbours or `to` lies
    /// outside the image.
    #[must_use]
    pub fn link_cost(&self, from: Pixel, to: Pixel) -> f64 {
        step_weight(from, to).map_or(OUT_OF_BOUNDS_COST, |step| self.cost(to) * step)
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.cost.dimensions()
    }

    /// Whether `pixel` lies inside the image.
    #[must_use]
    pub fn contains(&self, pixel: Pixel) -> bool {
        self.dimensions().contains(pixel)
    }

    /// Weights the cost was combined with.
    #[must_use]
    pub const fn weights(&self) -> CostWeights {
        self.weights
    }

    /// Horizontal Sobel derivative.
    #[must_use]
    pub const fn gradient_x(&self) -> &ScalarField<f64> {
        &self.gradient_x
    }

    /// Vertical Sobel derivative.
    #[must_use]
    pub const fn gradient_y(&self) -> &ScalarField<f64> {
        &self.gradient_y
    }

    /// Normalized gradient magnitude.
    #[must_use]
    pub const fn gradient_magnitude(&self) -> &ScalarField<f64> {
        &self.gradient_magnitude
    }

    /// Zero-crossing factor (0 at a crossing, 1 elsewhere).
    #[must_use]
    pub const fn zero_crossing(&self) -> &ScalarField<f64> {
        &self.zero_crossing
    }

    /// Combined cost field.
    #[must_use]
    pub const fn cost_field(&self) -> &ScalarField<f64> {
        &self.cost
    }

    /// The cost field as an 8-bit image (`cost * 255`, truncated).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn cost_image(&self) -> GrayImage {
        GrayImage::from_fn(self.cost.width(), self.cost.height(), |x, y| {
            Luma([(self.cost[(x, y)] * 255.0) as u8])
        })
    }

    /// The pixel with the strongest gradient magnitude in the
    /// `(2 * radius + 1)²` window around `pixel`.
    ///
    /// The window is clipped to the image and the first maximum in
    /// row-major order wins. When no window pixel is inside the image,
    /// `pixel` is returned unchanged.
    #[must_use]
    pub fn snap_to_edge(&self, pixel: Pixel, radius: u32) -> Pixel {
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        let mut best: Option<(Pixel, f64)> = None;
        for dy in -r..=r {
            for dx in -r..=r {
                let candidate = pixel.offset(dx, dy);
                let Some(magnitude) = self.gradient_magnitude.at(candidate) else {
                    continue;
                };
                if best.is_none_or(|(_, strongest)| magnitude > strongest) {
                    best = Some((candidate, magnitude));
                }
            }
        }
        best.map_or(pixel, |(snapped, _)| snapped)
    }
}

fn check_dimensions(dims: Dimensions) -> Result<(), LivewireError> {
    if dims.is_empty() {
        return Err(LivewireError::InvalidDimensions {
            width: dims.width,
            height: dims.height,
        });
    }
    Ok(())
}

/// Unit gradient at `(x, y)`; a zero gradient stays the zero vector.
fn unit_gradient(features: &FeatureMaps, x: u32, y: u32) -> (f64, f64) {
    let gx = features.gradient_x[(x, y)];
    let gy = features.gradient_y[(x, y)];
    let norm = gx.hypot(gy);
    if norm > 0.0 {
        (gx / norm, gy / norm)
    } else {
        (0.0, 0.0)
    }
}

/// Mean over the 8 directions of `min(|d x gC|, |d x gN|)`.
///
/// Neighbours outside the image contribute 1.0.
fn direction_factor(features: &FeatureMaps, x: u32, y: u32) -> f64 {
    let dims = features.gradient_x.dimensions();
    let center = unit_gradient(features, x, y);
    let mut sum = 0.0;
    for (dx, dy) in NEIGHBOR_OFFSETS {
        let neighbor = Pixel::new(
            i32::try_from(x).unwrap_or(i32::MAX).saturating_add(dx),
            i32::try_from(y).unwrap_or(i32::MAX).saturating_add(dy),
        );
        if !dims.contains(neighbor) {
            sum += 1.0;
            continue;
        }
        let (dx, dy) = (f64::from(dx), f64::from(dy));
        let len = dx.hypot(dy);
        let (ux, uy) = (dx / len, dy / len);
        #[allow(clippy::cast_sign_loss)]
        let other = unit_gradient(features, neighbor.x as u32, neighbor.y as u32);
        let cross_center = ux.mul_add(center.1, -(uy * center.0)).abs();
        let cross_neighbor = ux.mul_add(other.1, -(uy * other.0)).abs();
        sum += cross_center.min(cross_neighbor);
    }
    sum / 8.0
}

fn combine(features: &FeatureMaps, weights: CostWeights) -> ScalarField<f64> {
    let dims = features.gradient_x.dimensions();
    ScalarField::from_fn(dims, |x, y| {
        if !is_interior(dims, x, y) {
            return BORDER_COST;
        }
        let f_z = features.zero_crossing[(x, y)];
        let f_g = 1.0 - features.gradient_magnitude[(x, y)];
        let f_d = direction_factor(features, x, y);
        weights
            .zero_crossing
            .mul_add(
                f_z,
                weights
                    .gradient_magnitude
                    .mul_add(f_g, weights.gradient_direction * f_d),
            )
            .clamp(0.0, 1.0)
    })
}
