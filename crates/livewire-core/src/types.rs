//! Shared types for the live-wire tracing core.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference mask and
/// cost rasters without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference cut-out
/// images without depending on `image` directly.
pub use image::RgbaImage;

/// Re-export `DynamicImage`, the raster type every entry point accepts.
pub use image::DynamicImage;

/// An integer pixel coordinate.
///
/// Coordinates are signed so callers can probe positions outside the
/// image (e.g. the neighbours of a border pixel); such pixels are simply
/// rejected by the bounds checks downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pixel {
    /// Column (pixels from the left edge).
    pub x: i32,
    /// Row (pixels from the top edge).
    pub y: i32,
}

impl Pixel {
    /// Create a new pixel coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The pixel displaced by `(dx, dy)`, saturating at the `i32` range.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Squared Euclidean distance to another pixel.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another pixel.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Whether `other` is one of the 8 grid neighbours of `self`.
    #[must_use]
    pub const fn is_neighbor(self, other: Self) -> bool {
        let dx = (self.x as i64 - other.x as i64).abs();
        let dy = (self.y as i64 - other.y as i64).abs();
        dx <= 1 && dy <= 1 && (dx + dy) > 0
    }
}

impl fmt::Display for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `pixel` lies inside the image.
    #[must_use]
    pub fn contains(self, pixel: Pixel) -> bool {
        self.index_of(pixel).is_some()
    }

    /// Whether `pixel` is on the first/last row or column.
    ///
    /// Out-of-bounds pixels are not border pixels.
    #[must_use]
    pub fn is_border(self, pixel: Pixel) -> bool {
        self.contains(pixel)
            && (pixel.x == 0
                || pixel.y == 0
                || i64::from(pixel.x) == i64::from(self.width) - 1
                || i64::from(pixel.y) == i64::from(self.height) - 1)
    }

    /// Row-major index of `pixel`, or `None` when it lies outside.
    #[must_use]
    pub fn index_of(self, pixel: Pixel) -> Option<usize> {
        let x = u32::try_from(pixel.x).ok()?;
        let y = u32::try_from(pixel.y).ok()?;
        (x < self.width && y < self.height)
            .then(|| y as usize * self.width as usize + x as usize)
    }

    /// Inverse of [`index_of`](Self::index_of).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub const fn pixel_at(self, index: usize) -> Pixel {
        let width = self.width as usize;
        Pixel::new((index % width) as i32, (index / width) as i32)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An 8-connected pixel path, ordered seed-first.
///
/// Both endpoints are included. An empty path means "no path".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path(Vec<Pixel>);

impl Path {
    /// Create a path from a vector of pixels.
    #[must_use]
    pub const fn new(pixels: Vec<Pixel>) -> Self {
        Self(pixels)
    }

    /// The empty path.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Returns `true` if the path has no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of pixels in the path.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// The first pixel (the seed), if any.
    #[must_use]
    pub fn first(&self) -> Option<&Pixel> {
        self.0.first()
    }

    /// The last pixel (the target), if any.
    #[must_use]
    pub fn last(&self) -> Option<&Pixel> {
        self.0.last()
    }

    /// Returns a slice of all pixels.
    #[must_use]
    pub fn pixels(&self) -> &[Pixel] {
        &self.0
    }

    /// Whether every consecutive pair of pixels are grid neighbours.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.0.windows(2).all(|w| w[0].is_neighbor(w[1]))
    }
}

/// The traced outline: frozen segments plus the first seed used for
/// closure testing.
///
/// Only ever grows by appending segments; once closed it is final.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    first_seed: Option<Pixel>,
    segments: Vec<Path>,
    closed: bool,
}

impl Boundary {
    /// An empty boundary anchored at `first_seed`.
    #[must_use]
    pub const fn new(first_seed: Pixel) -> Self {
        Self {
            first_seed: Some(first_seed),
            segments: Vec::new(),
            closed: false,
        }
    }

    /// The seed the boundary started from.
    #[must_use]
    pub const fn first_seed(&self) -> Option<Pixel> {
        self.first_seed
    }

    /// Frozen segments in the order they were committed.
    #[must_use]
    pub fn segments(&self) -> &[Path] {
        &self.segments
    }

    /// Whether the closing segment has been appended.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// All segment pixels concatenated into one polyline.
    ///
    /// The first pixel of each segment after the first repeats the last
    /// pixel of its predecessor and is dropped.
    #[must_use]
    pub fn outline(&self) -> Vec<Pixel> {
        let mut outline: Vec<Pixel> = Vec::new();
        for segment in &self.segments {
            let pixels = segment.pixels();
            let skip = usize::from(outline.last().is_some() && outline.last() == pixels.first());
            outline.extend_from_slice(&pixels[skip.min(pixels.len())..]);
        }
        outline
    }

    pub(crate) fn push_segment(&mut self, segment: Path) {
        self.segments.push(segment);
    }

    pub(crate) const fn close(&mut self) {
        self.closed = true;
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width in pixels (at least 1).
    pub width: u32,
    /// Height in pixels (at least 1).
    pub height: u32,
}

impl BoundingBox {
    /// Grow the box by `padding` on every side, clipped to `dimensions`.
    #[must_use]
    pub fn padded(self, padding: u32, dimensions: Dimensions) -> Self {
        let x = self.x.saturating_sub(padding);
        let y = self.y.saturating_sub(padding);
        let right = self
            .x
            .saturating_add(self.width)
            .saturating_add(padding)
            .min(dimensions.width);
        let bottom = self
            .y
            .saturating_add(self.height)
            .saturating_add(padding)
            .min(dimensions.height);
        Self {
            x,
            y,
            width: right.saturating_sub(x),
            height: bottom.saturating_sub(y),
        }
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
pub(crate) mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Relative weights of the three per-pixel cost factors.
///
/// The weights are used as-is (not renormalized); the combined cost is
/// clamped to `[0, 1]` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    /// Weight of the Laplacian zero-crossing factor.
    pub zero_crossing: f64,
    /// Weight of the inverted gradient magnitude factor.
    pub gradient_magnitude: f64,
    /// Weight of the gradient direction coherence factor.
    pub gradient_direction: f64,
}

impl CostWeights {
    /// Default zero-crossing weight.
    pub const DEFAULT_ZERO_CROSSING: f64 = 0.43;
    /// Default gradient magnitude weight.
    pub const DEFAULT_GRADIENT_MAGNITUDE: f64 = 0.43;
    /// Default gradient direction weight.
    pub const DEFAULT_GRADIENT_DIRECTION: f64 = 0.14;

    /// Check that every weight is finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`LivewireError::InvalidConfig`] naming the first bad weight.
    pub fn validate(&self) -> Result<(), LivewireError> {
        for (name, value) in [
            ("zero_crossing", self.zero_crossing),
            ("gradient_magnitude", self.gradient_magnitude),
            ("gradient_direction", self.gradient_direction),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LivewireError::InvalidConfig(format!(
                    "weight {name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            zero_crossing: Self::DEFAULT_ZERO_CROSSING,
            gradient_magnitude: Self::DEFAULT_GRADIENT_MAGNITUDE,
            gradient_direction: Self::DEFAULT_GRADIENT_DIRECTION,
        }
    }
}

/// Tunable parameters of a tracing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Freezing within this Euclidean pixel distance of the first seed
    /// closes the boundary.
    pub closure_threshold: f64,

    /// Cost factor weights used when building the cost matrix.
    pub weights: CostWeights,

    /// Period of the path-stability timer driving auto-freeze.
    #[serde(with = "duration_serde")]
    pub settle_interval: Duration,

    /// Whether a path that stays unchanged across a settle interval is
    /// frozen automatically.
    pub auto_freeze: bool,

    /// Cursor positions snap to the strongest gradient within this many
    /// pixels (Chebyshev). Zero disables snapping.
    pub snap_radius: u32,

    /// Margin in pixels kept around the selection when cropping the
    /// cut-out image.
    pub crop_padding: u32,
}

impl SessionConfig {
    /// Default closure threshold in pixels.
    pub const DEFAULT_CLOSURE_THRESHOLD: f64 = 10.0;
    /// Default auto-freeze settle interval.
    pub const DEFAULT_SETTLE_INTERVAL: Duration = Duration::from_millis(600);
    /// Default cursor snap radius.
    pub const DEFAULT_SNAP_RADIUS: u32 = 2;
    /// Default cut-out crop padding.
    pub const DEFAULT_CROP_PADDING: u32 = 5;

    /// Check construction-time invariants.
    ///
    /// # Errors
    ///
    /// Returns [`LivewireError::InvalidConfig`] when a weight is invalid,
    /// the closure threshold is negative or not finite, or the settle
    /// interval is zero.
    pub fn validate(&self) -> Result<(), LivewireError> {
        self.weights.validate()?;
        if !self.closure_threshold.is_finite() || self.closure_threshold < 0.0 {
            return Err(LivewireError::InvalidConfig(format!(
                "closure_threshold must be finite and non-negative, got {}",
                self.closure_threshold
            )));
        }
        if self.settle_interval.is_zero() {
            return Err(LivewireError::InvalidConfig(
                "settle_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            closure_threshold: Self::DEFAULT_CLOSURE_THRESHOLD,
            weights: CostWeights::default(),
            settle_interval: Self::DEFAULT_SETTLE_INTERVAL,
            auto_freeze: true,
            snap_radius: Self::DEFAULT_SNAP_RADIUS,
            crop_padding: Self::DEFAULT_CROP_PADDING,
        }
    }
}

/// Construction-time failures.
///
/// Out-of-bounds queries, unreachable targets and flat images are not
/// errors: they produce empty paths or all-zero feature maps instead.
#[derive(Debug, thiserror::Error)]
pub enum LivewireError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The image has a zero width or height.
    #[error("invalid image dimensions {width}x{height}: both must be positive")]
    InvalidDimensions {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },

    /// A feature map does not match the size of the others.
    #[error("feature map {name} is {actual}, expected {expected}")]
    DimensionMismatch {
        /// Which map disagreed.
        name: &'static str,
        /// Dimensions shared by the other maps.
        expected: Dimensions,
        /// Dimensions of the offending map.
        actual: Dimensions,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background cost matrix build died before reporting a result,
    /// or its result was already taken.
    #[error("cost matrix worker failed: {0}")]
    WorkerFailed(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Pixel tests ---

    #[test]
    fn pixel_distance() {
        let a = Pixel::new(10, 10);
        let b = Pixel::new(13, 14);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pixel_neighbors() {
        let p = Pixel::new(5, 5);
        assert!(p.is_neighbor(Pixel::new(6, 6)));
        assert!(p.is_neighbor(Pixel::new(5, 4)));
        assert!(!p.is_neighbor(p));
        assert!(!p.is_neighbor(Pixel::new(7, 5)));
    }

    #[test]
    fn pixel_offset_saturates() {
        let p = Pixel::new(i32::MAX, 0).offset(1, -1);
        assert_eq!(p, Pixel::new(i32::MAX, -1));
    }

    // --- Dimensions tests ---

    #[test]
    fn dimensions_index_round_trip() {
        let dims = Dimensions::new(7, 4);
        let p = Pixel::new(3, 2);
        let index = dims.index_of(p).unwrap();
        assert_eq!(index, 17);
        assert_eq!(dims.pixel_at(index), p);
    }

    #[test]
    fn dimensions_reject_outside_pixels() {
        let dims = Dimensions::new(7, 4);
        assert!(!dims.contains(Pixel::new(-1, 0)));
        assert!(!dims.contains(Pixel::new(7, 0)));
        assert!(!dims.contains(Pixel::new(0, 4)));
        assert!(dims.contains(Pixel::new(6, 3)));
    }

    #[test]
    fn dimensions_border() {
        let dims = Dimensions::new(5, 5);
        assert!(dims.is_border(Pixel::new(0, 2)));
        assert!(dims.is_border(Pixel::new(4, 4)));
        assert!(!dims.is_border(Pixel::new(2, 2)));
        assert!(!dims.is_border(Pixel::new(-1, 2)));
    }

    // --- Path / Boundary tests ---

    #[test]
    fn path_connectivity() {
        let connected = Path::new(vec![Pixel::new(0, 0), Pixel::new(1, 1), Pixel::new(1, 2)]);
        assert!(connected.is_connected());
        let gap = Path::new(vec![Pixel::new(0, 0), Pixel::new(2, 0)]);
        assert!(!gap.is_connected());
        assert!(Path::empty().is_connected());
    }

    #[test]
    fn boundary_outline_drops_shared_junctions() {
        let mut boundary = Boundary::new(Pixel::new(0, 0));
        boundary.push_segment(Path::new(vec![Pixel::new(0, 0), Pixel::new(1, 0)]));
        boundary.push_segment(Path::new(vec![Pixel::new(1, 0), Pixel::new(1, 1)]));
        assert_eq!(
            boundary.outline(),
            vec![Pixel::new(0, 0), Pixel::new(1, 0), Pixel::new(1, 1)]
        );
        assert!(!boundary.is_closed());
    }

    #[test]
    fn bounding_box_padding_is_clipped() {
        let bbox = BoundingBox {
            x: 2,
            y: 8,
            width: 3,
            height: 2,
        };
        let padded = bbox.padded(5, Dimensions::new(12, 12));
        assert_eq!(
            padded,
            BoundingBox {
                x: 0,
                y: 3,
                width: 10,
                height: 9,
            }
        );
    }

    // --- Config tests ---

    #[test]
    fn session_config_defaults() {
        let config = SessionConfig::default();
        assert!((config.closure_threshold - 10.0).abs() < f64::EPSILON);
        assert!((config.weights.zero_crossing - 0.43).abs() < f64::EPSILON);
        assert!((config.weights.gradient_magnitude - 0.43).abs() < f64::EPSILON);
        assert!((config.weights.gradient_direction - 0.14).abs() < f64::EPSILON);
        assert_eq!(config.settle_interval, Duration::from_millis(600));
        assert!(config.auto_freeze);
        assert_eq!(config.snap_radius, 2);
        assert_eq!(config.crop_padding, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let weights = CostWeights {
            gradient_direction: -0.1,
            ..CostWeights::default()
        };
        let err = weights.validate().unwrap_err();
        assert!(err.to_string().contains("gradient_direction"));
    }

    #[test]
    fn zero_settle_interval_is_rejected() {
        let config = SessionConfig {
            settle_interval: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LivewireError::InvalidConfig(_))
        ));
    }

    #[test]
    fn session_config_serde_round_trip() {
        let config = SessionConfig {
            closure_threshold: 4.5,
            settle_interval: Duration::from_millis(250),
            auto_freeze: false,
            ..SessionConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn session_config_missing_fields_use_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"closure_threshold": 3.0}"#).unwrap();
        assert!((config.closure_threshold - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.settle_interval, SessionConfig::DEFAULT_SETTLE_INTERVAL);
    }

    // --- Error tests ---

    #[test]
    fn error_display() {
        assert_eq!(
            LivewireError::InvalidDimensions {
                width: 0,
                height: 4
            }
            .to_string(),
            "invalid image dimensions 0x4: both must be positive"
        );
        assert_eq!(
            LivewireError::DimensionMismatch {
                name: "gradient_y",
                expected: Dimensions::new(4, 4),
                actual: Dimensions::new(4, 3),
            }
            .to_string(),
            "feature map gradient_y is 4x3, expected 4x4"
        );
    }
}
