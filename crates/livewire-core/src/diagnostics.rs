//! Cost-matrix build diagnostics: timing and counts for each stage.
//!
//! These diagnostics are permanent instrumentation for tuning cost
//! weights on real images. [`build_with_diagnostics`] produces the same
//! [`CostMatrix`] as [`CostMatrix::build`] and reports what each stage
//! did along the way.
//!
//! Time is read through the [`Clock`] trait so native callers can use
//! `std::time::Instant` and WASM callers `performance.now()`.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility.

use std::time::Duration;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::cost::CostMatrix;
use crate::features::{self, FeatureMaps, is_interior};
use crate::field::ScalarField;
use crate::raster;
use crate::types::{CostWeights, LivewireError, duration_serde};

/// Normalized gradient magnitude at or above which a pixel counts as a
/// strong edge in the gradient stage metrics.
pub const STRONG_EDGE_MAGNITUDE: f64 = 0.5;

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single cost-matrix build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildDiagnostics {
    /// Stage 1: grayscale conversion.
    pub grayscale: StageDiagnostics,
    /// Stage 2: Sobel gradients and normalized magnitude.
    pub gradients: StageDiagnostics,
    /// Stage 3: Laplacian and zero-crossing detection.
    pub zero_crossings: StageDiagnostics,
    /// Stage 4: cost assembly (direction term and weighting).
    pub cost: StageDiagnostics,
    /// Total wall-clock duration of the build (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: BuildSummary,
}

/// Diagnostics for a single build stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Grayscale conversion metrics.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Number of input channels.
        channels: u8,
    },
    /// Gradient metrics.
    Gradients {
        /// Largest raw magnitude, before normalization.
        max_raw_magnitude: f64,
        /// Pixels with normalized magnitude at or above
        /// [`STRONG_EDGE_MAGNITUDE`].
        strong_edge_count: u64,
    },
    /// Zero-crossing metrics.
    ZeroCrossings {
        /// Pixels flagged as zero-crossings.
        zero_crossing_count: u64,
        /// Total pixel count for computing density.
        total_pixel_count: u64,
    },
    /// Cost assembly metrics over interior pixels.
    Cost {
        /// Weights the cost was combined with.
        weights: CostWeights,
        /// Smallest interior cost (1.0 when there is no interior).
        min_interior_cost: f64,
        /// Mean interior cost (1.0 when there is no interior).
        mean_interior_cost: f64,
        /// Largest interior cost (1.0 when there is no interior).
        max_interior_cost: f64,
    },
}

/// High-level summary of a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Pixels flagged as zero-crossings.
    pub zero_crossing_count: u64,
    /// Mean interior cost.
    pub mean_interior_cost: f64,
}

/// Build a cost matrix and record per-stage diagnostics.
///
/// # Errors
///
/// Same conditions as [`CostMatrix::build`].
pub fn build_with_diagnostics<C: Clock>(
    image: &DynamicImage,
    weights: CostWeights,
    clock: &C,
) -> Result<(CostMatrix, BuildDiagnostics), LivewireError> {
    let dims = raster::dimensions(image);
    if dims.is_empty() {
        return Err(LivewireError::InvalidDimensions {
            width: dims.width,
            height: dims.height,
        });
    }
    weights.validate()?;
    let total_start = clock.now();

    let start = clock.now();
    let gray = raster::grayscale(image);
    let grayscale = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Grayscale {
            width: dims.width,
            height: dims.height,
            channels: image.color().channel_count(),
        },
    };

    let start = clock.now();
    let (gradient_x, gradient_y) = features::sobel_gradients(&gray);
    let gradient_magnitude = features::gradient_magnitude(&gradient_x, &gradient_y);
    let max_raw_magnitude = gradient_x
        .values()
        .iter()
        .zip(gradient_y.values())
        .map(|(gx, gy)| gx.hypot(*gy))
        .fold(0.0, f64::max);
    let strong_edge_count = count(&gradient_magnitude, |m| m >= STRONG_EDGE_MAGNITUDE);
    let gradients = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Gradients {
            max_raw_magnitude,
            strong_edge_count,
        },
    };

    let start = clock.now();
    let zero_crossing = features::zero_crossings(&features::laplacian(&gray));
    let zero_crossing_count = count(&zero_crossing, |z| z == 0.0);
    let pixel_count = dims.pixel_count() as u64;
    let zero_crossings = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::ZeroCrossings {
            zero_crossing_count,
            total_pixel_count: pixel_count,
        },
    };

    let start = clock.now();
    let matrix = CostMatrix::from_feature_maps(
        FeatureMaps {
            gradient_x,
            gradient_y,
            gradient_magnitude,
            zero_crossing,
        },
        weights,
    )?;
    let (min_interior_cost, mean_interior_cost, max_interior_cost) =
        interior_cost_stats(matrix.cost_field());
    let cost = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Cost {
            weights,
            min_interior_cost,
            mean_interior_cost,
            max_interior_cost,
        },
    };

    let diagnostics = BuildDiagnostics {
        grayscale,
        gradients,
        zero_crossings,
        cost,
        total_duration: clock.elapsed(&total_start),
        summary: BuildSummary {
            image_width: dims.width,
            image_height: dims.height,
            pixel_count,
            zero_crossing_count,
            mean_interior_cost,
        },
    };
    Ok((matrix, diagnostics))
}

impl BuildDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Cost Matrix Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in [
            ("Grayscale", &self.grayscale),
            ("Gradients", &self.gradients),
            ("Zero Crossings", &self.zero_crossings),
            ("Cost", &self.cost),
        ] {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Zero crossings: {}  |  Mean interior cost: {:.4}",
            self.summary.zero_crossing_count, self.summary.mean_interior_cost,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale {
            width,
            height,
            channels,
        } => format!("{width}x{height}, {channels} channel(s)"),
        StageMetrics::Gradients {
            max_raw_magnitude,
            strong_edge_count,
        } => format!("max={max_raw_magnitude:.1} strong={strong_edge_count}"),
        StageMetrics::ZeroCrossings {
            zero_crossing_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *zero_crossing_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("crossings={zero_crossing_count} ({density:.1}%)")
        }
        StageMetrics::Cost {
            weights,
            min_interior_cost,
            mean_interior_cost,
            max_interior_cost,
        } => format!(
            "w={:.2}/{:.2}/{:.2} cost min={min_interior_cost:.3} mean={mean_interior_cost:.3} max={max_interior_cost:.3}",
            weights.zero_crossing, weights.gradient_magnitude, weights.gradient_direction,
        ),
    }
}

fn interior_values(field: &ScalarField<f64>) -> impl Iterator<Item = f64> + '_ {
    let dims = field.dimensions();
    (0..dims.height)
        .flat_map(move |y| (0..dims.width).map(move |x| (x, y)))
        .filter(move |&(x, y)| is_interior(dims, x, y))
        .map(|(x, y)| field[(x, y)])
}

fn count(field: &ScalarField<f64>, predicate: impl Fn(f64) -> bool) -> u64 {
    field.values().iter().map(|&v| u64::from(predicate(v))).sum()
}

/// `(min, mean, max)` of the interior cost; all 1.0 without an interior.
fn interior_cost_stats(cost: &ScalarField<f64>) -> (f64, f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut n = 0u32;
    for value in interior_values(cost) {
        min = min.min(value);
        max = max.max(value);
        sum += value;
        n += 1;
    }
    if n == 0 {
        return (1.0, 1.0, 1.0);
    }
    (min, sum / f64::from(n), max)
}
