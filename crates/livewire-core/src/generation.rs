//! Monotonic generation counter for invalidating in-flight work.
//!
//! Every request for background work (a cost-matrix build, a search for
//! a new seed) is tagged with the generation current at the time. Bumping
//! the counter makes every earlier tag stale, so results that arrive late
//! can be detected and dropped, and long-running loops can check a
//! [`GenerationGuard`] and bail out early.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, cloneable generation counter.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    /// A counter starting at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current generation.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Invalidate all outstanding guards and return the new generation.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// A guard tagged with the current generation.
    #[must_use]
    pub fn guard(&self) -> GenerationGuard {
        GenerationGuard {
            counter: Arc::clone(&self.0),
            issued: self.current(),
        }
    }
}

/// Snapshot of a [`Generation`] at the time some work was requested.
#[derive(Debug, Clone)]
pub struct GenerationGuard {
    counter: Arc<AtomicU64>,
    issued: u64,
}

impl GenerationGuard {
    /// The generation this guard was issued for.
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.issued
    }

    /// Whether no newer generation has been started since issue.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::Acquire) == self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_invalidates_guards() {
        let generation = Generation::new();
        let guard = generation.guard();
        assert!(guard.is_current());
        assert_eq!(generation.advance(), 1);
        assert!(!guard.is_current());
        assert!(generation.guard().is_current());
    }

    #[test]
    fn clones_share_the_counter() {
        let generation = Generation::new();
        let handle = generation.clone();
        let guard = generation.guard();
        handle.advance();
        assert_eq!(generation.current(), 1);
        assert!(!guard.is_current());
    }

    #[test]
    fn guard_is_observable_from_another_thread() {
        let generation = Generation::new();
        let guard = generation.guard();
        let handle = std::thread::spawn(move || guard.is_current());
        assert!(handle.join().is_ok_and(|current| current));
    }
}
