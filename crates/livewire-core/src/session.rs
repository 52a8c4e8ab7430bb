//! Interactive tracing session: seeds, previews, frozen segments and
//! loop closure.
//!
//! The session is an explicit state machine driven by the host surface.
//! The host forwards seed clicks, cursor moves and reset requests, and
//! calls [`LiveWireSession::poll_auto_freeze`] from its event loop with
//! the current time. Nothing here spawns threads or reads the clock.
//!
//! ```text
//! Idle --set_first_seed--> Tracing --freeze near first seed--> Closed
//!                            |  ^                                 |
//!                            +--+ freeze elsewhere                |
//!   ^                                                             |
//!   +----------------------------- reset -------------------------+
//! ```

use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::cost::CostMatrix;
use crate::generation::Generation;
use crate::search::{LiveWireSearch, SearchOutcome, SearchStats, SearchStatus};
use crate::selection::{self, SelectionMask};
use crate::types::{Boundary, LivewireError, Path, Pixel, SessionConfig};

/// What a seed click, freeze or auto-freeze did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreezeOutcome {
    /// The first seed was placed.
    SeedPlaced,
    /// A segment was appended and its end became the new seed.
    Appended,
    /// The closing segment back to the first seed was appended.
    Closed,
    /// Nothing changed.
    Ignored,
}

/// Repeating path-stability timer.
///
/// Fires every `interval` after the last restart. The path remembered
/// at one firing is compared with the path at the next.
#[derive(Debug, Clone)]
struct StabilityTimer {
    interval: Duration,
    next_fire: Option<Instant>,
    remembered: Option<Path>,
}

impl StabilityTimer {
    const fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_fire: None,
            remembered: None,
        }
    }

    fn restart(&mut self, now: Instant) {
        self.next_fire = Some(now + self.interval);
    }

    const fn stop(&mut self) {
        self.next_fire = None;
    }

    fn clear(&mut self) {
        self.next_fire = None;
        self.remembered = None;
    }

    /// Consume every firing due at or before `now` and return how many
    /// there were, saturating at `u32::MAX`.
    fn fire(&mut self, now: Instant) -> u32 {
        let Some(due) = self.next_fire else {
            return 0;
        };
        if due > now {
            return 0;
        }
        let interval_ns = self.interval.as_nanos().max(1);
        let late_ns = now.duration_since(due).as_nanos();
        let into_period = Duration::from_nanos(u64::try_from(late_ns % interval_ns).unwrap_or(0));
        self.next_fire = Some(now + self.interval.saturating_sub(into_period));
        u32::try_from(late_ns / interval_ns + 1).unwrap_or(u32::MAX)
    }
}

/// A live-wire tracing session over one image.
#[derive(Debug)]
pub struct LiveWireSession {
    matrix: Arc<CostMatrix>,
    config: SessionConfig,
    search: LiveWireSearch,
    boundary: Boundary,
    current_seed: Option<Pixel>,
    cursor: Option<Pixel>,
    preview: Path,
    generation: Generation,
    timer: StabilityTimer,
}

impl LiveWireSession {
    /// Start an idle session on a built cost matrix.
    ///
    /// # Errors
    ///
    /// Returns [`LivewireError::InvalidConfig`] when `config` fails
    /// validation.
    pub fn new(matrix: Arc<CostMatrix>, config: SessionConfig) -> Result<Self, LivewireError> {
        config.validate()?;
        if matrix.weights() != config.weights {
            log::warn!(
                "session weights {:?} differ from the cost matrix weights {:?}; the matrix wins",
                config.weights,
                matrix.weights()
            );
        }
        Ok(Self {
            search: LiveWireSearch::new(Arc::clone(&matrix)),
            timer: StabilityTimer::new(config.settle_interval),
            matrix,
            config,
            boundary: Boundary::default(),
            current_seed: None,
            cursor: None,
            preview: Path::empty(),
            generation: Generation::new(),
        })
    }

    // ----- core operations -----

    /// Start a new boundary at `pixel`, dropping any previous one.
    ///
    /// Returns `false` (and changes nothing) when `pixel` lies outside
    /// the image.
    pub fn set_first_seed(&mut self, pixel: Pixel) -> bool {
        if !self.matrix.contains(pixel) {
            log::debug!("ignoring out-of-bounds first seed {pixel}");
            return false;
        }
        self.generation.advance();
        self.boundary = Boundary::new(pixel);
        self.current_seed = Some(pixel);
        self.preview = Path::empty();
        self.timer.clear();
        log::info!("first seed placed at {pixel}");
        true
    }

    /// Minimum-cost path from the current seed to `cursor`.
    ///
    /// The first preview after a seed change settles the whole image;
    /// later previews from the same seed only walk predecessors. Empty
    /// without a seed, once closed, or for an out-of-bounds cursor.
    pub fn preview_to(&mut self, cursor: Pixel) -> Path {
        let path = match self.current_seed {
            Some(seed) if !self.boundary.is_closed() => self.path_from(seed, cursor),
            _ => Path::empty(),
        };
        self.preview.clone_from(&path);
        path
    }

    /// Commit the path ending at `point`.
    ///
    /// Within `closure_threshold` of the first seed the path from the
    /// current seed back to the first seed closes the boundary, and all
    /// further input is ignored until [`reset`](Self::reset). Otherwise
    /// the path to `point` is appended and `point` becomes the seed.
    pub fn freeze(&mut self, point: Pixel) -> FreezeOutcome {
        if self.boundary.is_closed() || !self.matrix.contains(point) {
            return FreezeOutcome::Ignored;
        }
        let (Some(first_seed), Some(seed)) = (self.boundary.first_seed(), self.current_seed)
        else {
            return FreezeOutcome::Ignored;
        };

        if point.distance(first_seed) <= self.config.closure_threshold {
            let closing = self.path_from(seed, first_seed);
            if closing.is_empty() {
                return FreezeOutcome::Ignored;
            }
            self.boundary.push_segment(closing);
            self.boundary.close();
            self.finish_freeze();
            log::info!(
                "boundary closed at {first_seed} after {} segments",
                self.boundary.segments().len()
            );
            return FreezeOutcome::Closed;
        }

        let segment = self.path_from(seed, point);
        if segment.len() < 2 {
            return FreezeOutcome::Ignored;
        }
        log::info!("froze {}-pixel segment {seed} -> {point}", segment.len());
        self.boundary.push_segment(segment);
        self.current_seed = Some(point);
        self.generation.advance();
        self.finish_freeze();
        FreezeOutcome::Appended
    }

    /// Drop the boundary, seeds and cursor.
    pub fn reset(&mut self) {
        self.generation.advance();
        self.boundary = Boundary::default();
        self.current_seed = None;
        self.cursor = None;
        self.preview = Path::empty();
        self.timer.clear();
        log::info!("session reset");
    }

    // ----- host events -----

    /// A click: places the first seed, then freezes at later clicks.
    pub fn on_seed_click(&mut self, pixel: Pixel) -> FreezeOutcome {
        if self.boundary.is_closed() {
            FreezeOutcome::Ignored
        } else if self.current_seed.is_none() {
            if self.set_first_seed(pixel) {
                FreezeOutcome::SeedPlaced
            } else {
                FreezeOutcome::Ignored
            }
        } else {
            self.freeze(pixel)
        }
    }

    /// A cursor move: snaps the cursor to the strongest nearby edge,
    /// restarts the stability timer and returns the new preview.
    pub fn on_cursor_move(&mut self, pixel: Pixel, now: Instant) -> Path {
        if self.boundary.is_closed() {
            return Path::empty();
        }
        let cursor = if self.config.snap_radius > 0 {
            self.matrix.snap_to_edge(pixel, self.config.snap_radius)
        } else {
            pixel
        };
        self.cursor = Some(cursor);
        if self.config.auto_freeze && self.current_seed.is_some() {
            self.timer.restart(now);
        }
        self.preview_to(cursor)
    }

    /// A reset request from the host.
    pub fn on_reset_requested(&mut self) {
        self.reset();
    }

    /// Process stability timer firings due at `now`.
    ///
    /// At each firing the current preview is compared with the preview
    /// remembered at the previous firing. An unchanged, non-empty path
    /// freezes at the cursor (closing the boundary when near the first
    /// seed) and stops the timer until the next cursor move.
    pub fn poll_auto_freeze(&mut self, now: Instant) -> FreezeOutcome {
        if !self.config.auto_freeze || self.boundary.is_closed() {
            return FreezeOutcome::Ignored;
        }
        let Some(cursor) = self.cursor else {
            return FreezeOutcome::Ignored;
        };
        // Without a cursor move in between, consecutive firings see the
        // same path, so only the first two of a backlog can matter.
        for _ in 0..self.timer.fire(now).min(2) {
            let current = self.preview_to(cursor);
            if !current.is_empty() && self.timer.remembered.as_ref() == Some(&current) {
                self.timer.stop();
                let outcome = self.freeze(cursor);
                log::debug!("auto-freeze at {cursor}: {outcome:?}");
                return outcome;
            }
            self.timer.remembered = Some(current);
        }
        FreezeOutcome::Ignored
    }

    /// When the stability timer fires next, if it is running.
    #[must_use]
    pub const fn next_auto_freeze_check(&self) -> Option<Instant> {
        self.timer.next_fire
    }

    // ----- queries -----

    /// Frozen segments in commit order.
    #[must_use]
    pub fn frozen_segments(&self) -> &[Path] {
        self.boundary.segments()
    }

    /// The boundary traced so far.
    #[must_use]
    pub const fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Whether the boundary has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.boundary.is_closed()
    }

    /// The seed the boundary started from.
    #[must_use]
    pub const fn first_seed(&self) -> Option<Pixel> {
        self.boundary.first_seed()
    }

    /// The seed the next segment starts from.
    #[must_use]
    pub const fn current_seed(&self) -> Option<Pixel> {
        self.current_seed
    }

    /// Last (snapped) cursor position.
    #[must_use]
    pub const fn cursor(&self) -> Option<Pixel> {
        self.cursor
    }

    /// The most recent preview path.
    #[must_use]
    pub const fn preview(&self) -> &Path {
        &self.preview
    }

    /// Counters of the last shortest-path run.
    #[must_use]
    pub const fn search_stats(&self) -> SearchStats {
        self.search.stats()
    }

    /// Current session generation; bumped by every seed change and reset.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.current()
    }

    /// A handle sharing the session's generation counter.
    ///
    /// Advancing it from another thread abandons an in-flight preview
    /// search, which then returns an empty path.
    #[must_use]
    pub fn cancellation_handle(&self) -> Generation {
        self.generation.clone()
    }

    /// Session parameters.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The cost matrix being traced on.
    #[must_use]
    pub const fn matrix(&self) -> &Arc<CostMatrix> {
        &self.matrix
    }

    // ----- export -----

    /// Selection mask of the closed boundary, `None` while open.
    #[must_use]
    pub fn export_mask(&self) -> Option<SelectionMask> {
        self.boundary
            .is_closed()
            .then(|| selection::rasterize_boundary(&self.boundary, self.matrix.dimensions()))
    }

    /// The selected region of `image` on a transparent background,
    /// cropped with `crop_padding`. `None` while open.
    #[must_use]
    pub fn cutout(&self, image: &DynamicImage) -> Option<RgbaImage> {
        self.export_mask()
            .map(|mask| selection::cutout(image, &mask, self.config.crop_padding))
    }

    // ----- internals -----

    fn path_from(&mut self, seed: Pixel, target: Pixel) -> Path {
        let cached = self.search.seed() == Some(seed)
            && self.search.status() == SearchStatus::Settled;
        if !cached {
            let guard = self.generation.guard();
            if self.search.compute_cancellable(seed, None, &guard) == SearchOutcome::Cancelled {
                return Path::empty();
            }
        }
        self.search.path_to(target)
    }

    fn finish_freeze(&mut self) {
        self.preview = Path::empty();
        self.timer.clear();
    }
}
