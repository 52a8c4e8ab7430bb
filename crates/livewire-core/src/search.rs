//! Single-source shortest paths over the implicit 8-neighbour pixel grid.
//!
//! Dijkstra's algorithm with a binary min-heap and lazy deletion: a pixel
//! may sit in the heap several times, and every entry popped after the
//! pixel was settled is discarded as stale. Moving `p -> q` costs
//! [`CostMatrix::link_cost`], so the grid graph is never materialized.
//!
//! One search state belongs to one seed. Choosing a different seed
//! rebuilds the state from scratch.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cost::CostMatrix;
use crate::features::NEIGHBOR_OFFSETS;
use crate::field::ScalarField;
use crate::generation::GenerationGuard;
use crate::types::{Path, Pixel};

/// Heap pops between two checks of a [`GenerationGuard`].
pub const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Progress of the search for the current seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStatus {
    /// No seed, or the last seed was rejected or cancelled.
    Uninitialized,
    /// Stopped early at a target; unsettled pixels may still be pending.
    Running,
    /// Every reachable pixel has its final distance.
    Settled,
}

/// Result of one `compute*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchOutcome {
    /// The heap drained; every reachable pixel is settled.
    Settled,
    /// The requested target was settled and the run stopped there.
    TargetReached,
    /// The generation moved on before the run finished.
    Cancelled,
    /// The seed lies outside the image; nothing was computed.
    InvalidSeed,
}

/// Counters of the most recent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Pixels whose distance became final.
    pub settled: usize,
    /// Heap insertions, including the seed.
    pub pushes: usize,
    /// Popped entries discarded because their pixel was already settled.
    pub stale_pops: usize,
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    distance: f64,
    sequence: u64,
    pixel: Pixel,
}

impl Ord for HeapEntry {
    // Reversed: BinaryHeap is a max-heap. Equal distances pop in
    // insertion order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

/// Live-wire shortest-path engine bound to one cost matrix.
#[derive(Debug, Clone)]
pub struct LiveWireSearch {
    matrix: Arc<CostMatrix>,
    seed: Option<Pixel>,
    status: SearchStatus,
    distance: ScalarField<f64>,
    visited: ScalarField<bool>,
    predecessor: ScalarField<Option<Pixel>>,
    heap: BinaryHeap<HeapEntry>,
    sequence: u64,
    stats: SearchStats,
}

impl LiveWireSearch {
    /// An idle search over `matrix`.
    #[must_use]
    pub fn new(matrix: Arc<CostMatrix>) -> Self {
        let dims = matrix.dimensions();
        Self {
            matrix,
            seed: None,
            status: SearchStatus::Uninitialized,
            distance: ScalarField::filled(dims, f64::INFINITY),
            visited: ScalarField::filled(dims, false),
            predecessor: ScalarField::filled(dims, None),
            heap: BinaryHeap::new(),
            sequence: 0,
            stats: SearchStats::default(),
        }
    }

    /// The cost matrix searched over.
    #[must_use]
    pub const fn matrix(&self) -> &Arc<CostMatrix> {
        &self.matrix
    }

    /// Settle every reachable pixel from `seed`, discarding any previous
    /// state.
    pub fn compute(&mut self, seed: Pixel) -> SearchOutcome {
        if !self.restart(seed) {
            return SearchOutcome::InvalidSeed;
        }
        self.run(None, None)
    }

    /// Run from `seed` until `target` is settled.
    ///
    /// When the current state already belongs to `seed` it is reused:
    /// a settled target returns immediately and a paused run resumes
    /// where it stopped. An out-of-bounds target settles everything.
    pub fn compute_to(&mut self, seed: Pixel, target: Pixel) -> SearchOutcome {
        if self.seed == Some(seed) && self.status != SearchStatus::Uninitialized {
            if self.is_settled(target) {
                return SearchOutcome::TargetReached;
            }
            if self.status == SearchStatus::Settled {
                return SearchOutcome::Settled;
            }
        } else if !self.restart(seed) {
            return SearchOutcome::InvalidSeed;
        }
        self.run(Some(target), None)
    }

    /// Like [`compute`](Self::compute) (or
    /// [`compute_to`](Self::compute_to) with a target), but abandons the
    /// run once `guard` is no longer current. A cancelled run leaves the
    /// search [`Uninitialized`](SearchStatus::Uninitialized).
    pub fn compute_cancellable(
        &mut self,
        seed: Pixel,
        target: Option<Pixel>,
        guard: &GenerationGuard,
    ) -> SearchOutcome {
        if !guard.is_current() {
            self.clear();
            return SearchOutcome::Cancelled;
        }
        if !self.restart(seed) {
            return SearchOutcome::InvalidSeed;
        }
        self.run(target, Some(&|| !guard.is_current()))
    }

    /// Minimum-cost path from the seed to `target`, seed first.
    ///
    /// Empty when nothing was computed, `target` is outside the image,
    /// or `target` has not been settled yet.
    #[must_use]
    pub fn path_to(&self, target: Pixel) -> Path {
        if self.seed.is_none() || !self.is_settled(target) {
            return Path::empty();
        }
        let mut pixels = vec![target];
        let mut current = target;
        while let Some(previous) = self.predecessor.at(current).flatten() {
            pixels.push(previous);
            current = previous;
            if pixels.len() > self.distance.values().len() {
                // Predecessors always form a tree rooted at the seed.
                log::warn!("predecessor walk from {target} did not terminate");
                return Path::empty();
            }
        }
        pixels.reverse();
        Path::new(pixels)
    }

    /// Best known distance from the seed, `None` outside the image or
    /// when `pixel` has not been reached.
    #[must_use]
    pub fn distance(&self, pixel: Pixel) -> Option<f64> {
        self.distance.at(pixel).filter(|d| d.is_finite())
    }

    /// Predecessor of `pixel` on its best known path. `None` for the
    /// seed, unreached pixels and pixels outside the image.
    #[must_use]
    pub fn predecessor(&self, pixel: Pixel) -> Option<Pixel> {
        self.predecessor.at(pixel).flatten()
    }

    /// Whether `pixel` has its final distance.
    #[must_use]
    pub fn is_settled(&self, pixel: Pixel) -> bool {
        self.visited.at(pixel) == Some(true)
    }

    /// Seed of the current state.
    #[must_use]
    pub const fn seed(&self) -> Option<Pixel> {
        self.seed
    }

    /// Current state of the search.
    #[must_use]
    pub const fn status(&self) -> SearchStatus {
        self.status
    }

    /// Counters of the state for the current seed.
    #[must_use]
    pub const fn stats(&self) -> SearchStats {
        self.stats
    }

    /// Drop all state. Out-of-bounds seeds leave the search idle.
    fn restart(&mut self, seed: Pixel) -> bool {
        self.clear();
        if !self.matrix.contains(seed) {
            log::debug!("ignoring search from out-of-bounds seed {seed}");
            return false;
        }
        self.seed = Some(seed);
        self.status = SearchStatus::Running;
        self.distance.set(seed, 0.0);
        self.push(seed, 0.0);
        true
    }

    fn clear(&mut self) {
        self.seed = None;
        self.status = SearchStatus::Uninitialized;
        self.distance.fill(f64::INFINITY);
        self.visited.fill(false);
        self.predecessor.fill(None);
        self.heap.clear();
        self.sequence = 0;
        self.stats = SearchStats::default();
    }

    fn push(&mut self, pixel: Pixel, distance: f64) {
        self.heap.push(HeapEntry {
            distance,
            sequence: self.sequence,
            pixel,
        });
        self.sequence += 1;
        self.stats.pushes += 1;
    }

    /// Pop until `target` settles or the heap drains. `cancelled` is
    /// polled every [`CANCEL_CHECK_INTERVAL`] pops.
    fn run(&mut self, target: Option<Pixel>, cancelled: Option<&dyn Fn() -> bool>) -> SearchOutcome {
        let mut pops = 0usize;
        while let Some(entry) = self.heap.pop() {
            pops += 1;
            if pops.is_multiple_of(CANCEL_CHECK_INTERVAL) && cancelled.is_some_and(|c| c()) {
                log::debug!("search from {:?} cancelled after {pops} pops", self.seed);
                self.clear();
                return SearchOutcome::Cancelled;
            }

            let pixel = entry.pixel;
            if self.visited.at(pixel) != Some(false) {
                self.stats.stale_pops += 1;
                continue;
            }
            self.visited.set(pixel, true);
            self.stats.settled += 1;

            for (dx, dy) in NEIGHBOR_OFFSETS {
                let neighbor = pixel.offset(dx, dy);
                if self.visited.at(neighbor) != Some(false) {
                    continue;
                }
                let candidate = entry.distance + self.matrix.link_cost(pixel, neighbor);
                if candidate < self.distance.at(neighbor).unwrap_or(f64::INFINITY) {
                    self.distance.set(neighbor, candidate);
                    self.predecessor.set(neighbor, Some(pixel));
                    self.push(neighbor, candidate);
                }
            }

            if target == Some(pixel) {
                return SearchOutcome::TargetReached;
            }
        }

        self.status = SearchStatus::Settled;
        log::debug!(
            "search from {:?} settled {} pixels ({} pushes, {} stale pops)",
            self.seed,
            self.stats.settled,
            self.stats.pushes,
            self.stats.stale_pops,
        );
        SearchOutcome::Settled
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::f64::consts::SQRT_2;

    use image::{DynamicImage, GrayImage, Luma};

    use super::*;
    use crate::generation::Generation;
    use crate::types::CostWeights;

    fn matrix(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Arc<CostMatrix> {
        let image =
            DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)])));
        Arc::new(CostMatrix::build(&image, CostWeights::default()).unwrap())
    }

    fn flat(size: u32) -> Arc<CostMatrix> {
        matrix(size, size, |_, _| 128)
    }

    fn textured() -> Arc<CostMatrix> {
        matrix(14, 11, |x, y| {
            u8::try_from((x * 53 + y * 29 + (x ^ y) * 17) % 256).unwrap()
        })
    }

    fn pixels(coords: &[(i32, i32)]) -> Vec<Pixel> {
        coords.iter().map(|&(x, y)| Pixel::new(x, y)).collect()
    }

    #[test]
    fn seed_path_is_the_seed() {
        let mut search = LiveWireSearch::new(flat(5));
        let seed = Pixel::new(2, 2);
        assert_eq!(search.compute(seed), SearchOutcome::Settled);
        assert_eq!(search.path_to(seed).pixels(), &[seed]);
        assert_eq!(search.distance(seed), Some(0.0));
        assert_eq!(search.predecessor(seed), None);
    }

    #[test]
    fn flat_image_straight_path() {
        let mut search = LiveWireSearch::new(flat(5));
        search.compute(Pixel::new(1, 2));
        let path = search.path_to(Pixel::new(3, 2));
        assert_eq!(path.pixels(), pixels(&[(1, 2), (2, 2), (3, 2)]).as_slice());
        let distance = search.distance(Pixel::new(3, 2)).unwrap();
        assert!((distance - 2.0 * 0.86).abs() < 1e-9);
    }

    #[test]
    fn flat_image_diagonal_path() {
        let mut search = LiveWireSearch::new(flat(5));
        search.compute(Pixel::new(1, 1));
        let path = search.path_to(Pixel::new(3, 3));
        assert_eq!(path.pixels(), pixels(&[(1, 1), (2, 2), (3, 3)]).as_slice());
        let distance = search.distance(Pixel::new(3, 3)).unwrap();
        assert!((distance - 2.0 * SQRT_2 * 0.86).abs() < 1e-9);
    }

    #[test]
    fn interior_paths_avoid_the_border() {
        let mut search = LiveWireSearch::new(flat(7));
        search.compute(Pixel::new(1, 1));
        let path = search.path_to(Pixel::new(5, 1));
        assert_eq!(path.len(), 5);
        assert!(path.pixels().iter().all(|p| p.y == 1));
    }

    #[test]
    fn paths_are_connected_and_end_at_target() {
        let mut search = LiveWireSearch::new(textured());
        let seed = Pixel::new(3, 4);
        search.compute(seed);
        for target in [Pixel::new(0, 0), Pixel::new(13, 10), Pixel::new(7, 2)] {
            let path = search.path_to(target);
            assert_eq!(path.first(), Some(&seed));
            assert_eq!(path.last(), Some(&target));
            assert!(path.is_connected());
        }
    }

    #[test]
    fn settled_distances_are_optimal() {
        let matrix = textured();
        let mut search = LiveWireSearch::new(Arc::clone(&matrix));
        let seed = Pixel::new(6, 5);
        search.compute(seed);
        let dims = matrix.dimensions();
        for index in 0..dims.pixel_count() {
            let p = dims.pixel_at(index);
            let d = search.distance(p).unwrap();
            if p != seed {
                let pred = search.predecessor(p).unwrap();
                let via = search.distance(pred).unwrap() + matrix.link_cost(pred, p);
                assert!((d - via).abs() < 1e-9, "{p} distance {d} vs {via}");
            }
            for (dx, dy) in NEIGHBOR_OFFSETS {
                let n = p.offset(dx, dy);
                if let Some(dn) = search.distance(n) {
                    assert!(d <= dn + matrix.link_cost(n, p) + 1e-9);
                }
            }
        }
    }

    #[test]
    fn recompute_is_idempotent() {
        let matrix = textured();
        let seed = Pixel::new(2, 9);
        let mut first = LiveWireSearch::new(Arc::clone(&matrix));
        first.compute(seed);
        let mut second = LiveWireSearch::new(matrix);
        second.compute(Pixel::new(10, 1));
        second.compute(seed);
        assert_eq!(first.distance, second.distance);
        assert_eq!(first.predecessor, second.predecessor);
        assert_eq!(first.stats(), second.stats());
    }

    #[test]
    fn out_of_bounds_seed_is_a_no_op() {
        let mut search = LiveWireSearch::new(flat(5));
        assert_eq!(search.compute(Pixel::new(-1, 2)), SearchOutcome::InvalidSeed);
        assert_eq!(search.status(), SearchStatus::Uninitialized);
        assert_eq!(search.seed(), None);
        assert!(search.path_to(Pixel::new(2, 2)).is_empty());
    }

    #[test]
    fn queries_before_compute_are_empty() {
        let search = LiveWireSearch::new(flat(5));
        assert!(search.path_to(Pixel::new(1, 1)).is_empty());
        assert_eq!(search.distance(Pixel::new(1, 1)), None);
        assert_eq!(search.status(), SearchStatus::Uninitialized);
    }

    #[test]
    fn out_of_bounds_target_has_no_path() {
        let mut search = LiveWireSearch::new(flat(5));
        search.compute(Pixel::new(2, 2));
        assert!(search.path_to(Pixel::new(5, 2)).is_empty());
        assert!(search.path_to(Pixel::new(2, -3)).is_empty());
    }

    #[test]
    fn compute_to_stops_early_and_resumes() {
        let mut search = LiveWireSearch::new(flat(20));
        let seed = Pixel::new(1, 1);
        assert_eq!(
            search.compute_to(seed, Pixel::new(2, 1)),
            SearchOutcome::TargetReached
        );
        assert_eq!(search.status(), SearchStatus::Running);
        assert!(search.stats().settled < 400);
        assert_eq!(search.path_to(Pixel::new(2, 1)).len(), 2);
        assert!(search.path_to(Pixel::new(18, 18)).is_empty());

        let settled_before = search.stats().settled;
        assert_eq!(
            search.compute_to(seed, Pixel::new(18, 18)),
            SearchOutcome::TargetReached
        );
        assert!(search.stats().settled > settled_before);
        assert!(search.path_to(Pixel::new(18, 18)).is_connected());

        // Already settled: no extra work.
        let settled_after = search.stats().settled;
        search.compute_to(seed, Pixel::new(3, 3));
        assert_eq!(search.stats().settled, settled_after);
    }

    #[test]
    fn compute_to_out_of_bounds_target_settles_everything() {
        let mut search = LiveWireSearch::new(flat(6));
        assert_eq!(
            search.compute_to(Pixel::new(2, 2), Pixel::new(60, 60)),
            SearchOutcome::Settled
        );
        assert_eq!(search.status(), SearchStatus::Settled);
        assert_eq!(search.stats().settled, 36);
    }

    #[test]
    fn stale_guard_cancels() {
        let generation = Generation::new();
        let guard = generation.guard();
        generation.advance();
        let mut search = LiveWireSearch::new(flat(64));
        assert_eq!(
            search.compute_cancellable(Pixel::new(5, 5), None, &guard),
            SearchOutcome::Cancelled
        );
        assert_eq!(search.status(), SearchStatus::Uninitialized);
        assert!(search.path_to(Pixel::new(5, 5)).is_empty());
    }

    #[test]
    fn cancellation_mid_run_drops_partial_state() {
        let mut search = LiveWireSearch::new(flat(64));
        let seed = Pixel::new(5, 5);
        assert!(search.restart(seed));
        // Still wanted at the first check, gone at the second.
        let checks = std::cell::Cell::new(0);
        let cancelled = || {
            checks.set(checks.get() + 1);
            checks.get() > 1
        };
        assert_eq!(search.run(None, Some(&cancelled)), SearchOutcome::Cancelled);
        assert_eq!(checks.get(), 2);
        assert_eq!(search.status(), SearchStatus::Uninitialized);
        assert_eq!(search.seed(), None);
        assert_eq!(search.stats(), SearchStats::default());
        assert!(!search.is_settled(seed));
        assert!(search.path_to(Pixel::new(6, 6)).is_empty());

        // A fresh run afterwards starts over and settles everything.
        assert_eq!(search.compute(seed), SearchOutcome::Settled);
        assert!(search.is_settled(Pixel::new(63, 63)));
        assert_eq!(search.stats().settled, 64 * 64);
    }

    #[test]
    fn current_guard_runs_to_completion() {
        let generation = Generation::new();
        let mut search = LiveWireSearch::new(flat(64));
        assert_eq!(
            search.compute_cancellable(Pixel::new(5, 5), None, &generation.guard()),
            SearchOutcome::Settled
        );
        assert_eq!(search.stats().settled, 64 * 64);
    }

    #[test]
    fn stats_count_stale_entries() {
        let mut search = LiveWireSearch::new(textured());
        search.compute(Pixel::new(4, 4));
        let stats = search.stats();
        assert_eq!(stats.settled, 14 * 11);
        assert_eq!(stats.pushes, stats.settled + stats.stale_pops);
    }
}
