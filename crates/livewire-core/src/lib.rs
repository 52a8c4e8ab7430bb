//! livewire-core: Pure live-wire (intelligent scissors) tracing (sans-IO).
//!
//! Given a raster image, a seed pixel and a moving cursor, computes the
//! minimum-cost 8-connected path between them, where cost is low along
//! strong image edges:
//!
//! grayscale -> Sobel gradients / Laplacian zero-crossings ->
//! per-pixel cost -> Dijkstra from the seed -> session policy
//! (freeze, auto-freeze, closure) -> selection mask.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and returns structured data. Windows, event delivery and file
//! access belong to the host; the host feeds clicks and cursor moves to
//! a [`LiveWireSession`] and renders what it returns.
//!
//! Construction is two-phase: build the [`CostMatrix`] (slow, typically
//! on a [`CostMatrixWorker`]), then start a session on it.

pub mod cost;
pub mod diagnostics;
pub mod features;
pub mod field;
pub mod generation;
pub mod raster;
pub mod search;
pub mod selection;
pub mod session;
pub mod types;
pub mod worker;

use std::sync::Arc;

pub use cost::{BORDER_COST, CostMatrix, OUT_OF_BOUNDS_COST};
pub use diagnostics::{BuildDiagnostics, Clock};
pub use features::FeatureMaps;
pub use field::ScalarField;
pub use generation::{Generation, GenerationGuard};
pub use search::{LiveWireSearch, SearchOutcome, SearchStats, SearchStatus};
pub use selection::SelectionMask;
pub use session::{FreezeOutcome, LiveWireSession};
pub use types::{
    Boundary, BoundingBox, CostWeights, Dimensions, DynamicImage, GrayImage, LivewireError, Path,
    Pixel, RgbaImage, SessionConfig,
};
pub use web_time::Instant;
pub use worker::{BuildResult, CostMatrixWorker};

/// Decode raw image bytes and build their cost matrix.
///
/// Accepts PNG, JPEG, BMP and WebP input.
///
/// # Errors
///
/// Returns [`LivewireError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`LivewireError::ImageDecode`] if the image format is unrecognized.
/// Returns [`LivewireError::InvalidConfig`] if a weight is invalid.
pub fn build_cost_matrix(
    image_bytes: &[u8],
    weights: CostWeights,
) -> Result<(DynamicImage, CostMatrix), LivewireError> {
    let image = raster::decode(image_bytes)?;
    let matrix = CostMatrix::build(&image, weights)?;
    Ok((image, matrix))
}

/// Build the cost matrix of `image` with `config.weights` and start a
/// session on it, on the calling thread.
///
/// # Errors
///
/// Returns [`LivewireError::InvalidDimensions`] for an empty image and
/// [`LivewireError::InvalidConfig`] when `config` fails validation.
pub fn start_session(
    image: &DynamicImage,
    config: SessionConfig,
) -> Result<LiveWireSession, LivewireError> {
    config.validate()?;
    let matrix = CostMatrix::build(image, config.weights)?;
    LiveWireSession::new(Arc::new(matrix), config)
}
