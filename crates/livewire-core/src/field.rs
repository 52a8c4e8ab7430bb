//! Dense per-pixel value grids.
//!
//! [`ScalarField`] keeps all index math in one place: values are stored
//! row-major and addressed by `(x, y)`. Every feature map, the final cost
//! and the search state are fields of the same size as the source image.

use std::ops::{Index, IndexMut};

use crate::types::{Dimensions, LivewireError, Pixel};

/// A dense 2D grid of values with the dimensions of the source image.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField<T> {
    dimensions: Dimensions,
    values: Vec<T>,
}

impl<T: Copy> ScalarField<T> {
    /// A field with every cell set to `value`.
    #[must_use]
    pub fn filled(dimensions: Dimensions, value: T) -> Self {
        Self {
            dimensions,
            values: vec![value; dimensions.pixel_count()],
        }
    }

    /// A field computed cell by cell, in row-major order.
    #[must_use]
    pub fn from_fn(dimensions: Dimensions, mut f: impl FnMut(u32, u32) -> T) -> Self {
        let mut values = Vec::with_capacity(dimensions.pixel_count());
        for y in 0..dimensions.height {
            for x in 0..dimensions.width {
                values.push(f(x, y));
            }
        }
        Self { dimensions, values }
    }

    /// Wrap row-major `values`.
    ///
    /// # Errors
    ///
    /// Returns [`LivewireError::InvalidConfig`] when `values` does not
    /// hold exactly `width * height` entries.
    pub fn from_vec(dimensions: Dimensions, values: Vec<T>) -> Result<Self, LivewireError> {
        if values.len() != dimensions.pixel_count() {
            return Err(LivewireError::InvalidConfig(format!(
                "field of {dimensions} needs {} values, got {}",
                dimensions.pixel_count(),
                values.len()
            )));
        }
        Ok(Self { dimensions, values })
    }

    /// The value at `pixel`, or `None` outside the field.
    #[must_use]
    pub fn at(&self, pixel: Pixel) -> Option<T> {
        self.dimensions
            .index_of(pixel)
            .map(|index| self.values[index])
    }

    /// Overwrite the value at `pixel`. Outside the field this is a no-op.
    pub fn set(&mut self, pixel: Pixel, value: T) {
        if let Some(index) = self.dimensions.index_of(pixel) {
            self.values[index] = value;
        }
    }

    /// Set every cell to `value`.
    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }

    /// Apply `f` to every cell in place.
    pub fn map_in_place(&mut self, mut f: impl FnMut(T) -> T) {
        for value in &mut self.values {
            *value = f(*value);
        }
    }
}

impl<T> ScalarField<T> {
    /// Field dimensions (equal to the source image's).
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// All values, row-major.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.dimensions.width && y < self.dimensions.height);
        y as usize * self.dimensions.width as usize + x as usize
    }
}

impl ScalarField<f64> {
    /// Largest value in the field, or 0 for an empty field.
    #[must_use]
    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Divide every value by the field maximum.
    ///
    /// A field whose maximum is 0 (flat input) is left untouched.
    pub fn normalize_by_max(&mut self) {
        let max = self.max_value();
        if max > 0.0 {
            self.map_in_place(|v| v / max);
        }
    }
}

impl<T> Index<(u32, u32)> for ScalarField<T> {
    type Output = T;

    fn index(&self, (x, y): (u32, u32)) -> &T {
        &self.values[self.offset(x, y)]
    }
}

impl<T> IndexMut<(u32, u32)> for ScalarField<T> {
    fn index_mut(&mut self, (x, y): (u32, u32)) -> &mut T {
        let offset = self.offset(x, y);
        &mut self.values[offset]
    }
}
