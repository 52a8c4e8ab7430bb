//! Background cost-matrix construction.
//!
//! Building the cost matrix touches every pixel several times and is far
//! too slow for an interactive thread on large images. The host spawns a
//! [`CostMatrixWorker`], keeps handling events, and starts the session
//! once [`CostMatrixWorker::try_take`] yields a result.
//!
//! Each build is tagged with a [`GenerationGuard`]. When the host loads a
//! different image it advances the generation, and a late result from
//! the old build reports itself as stale instead of replacing the new
//! one.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use image::DynamicImage;

use crate::cost::CostMatrix;
use crate::generation::GenerationGuard;
use crate::types::{CostWeights, LivewireError};

/// Name given to build threads.
pub const THREAD_NAME: &str = "livewire-cost";

/// A finished build together with the generation it was requested for.
#[derive(Debug)]
pub struct BuildResult {
    guard: GenerationGuard,
    /// The built matrix or the reason the build failed.
    pub result: Result<CostMatrix, LivewireError>,
}

impl BuildResult {
    /// Generation the build was requested with.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.guard.issued()
    }

    /// Whether a newer generation has started since the request.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        !self.guard.is_current()
    }
}

#[derive(Debug)]
enum WorkerState {
    Running(JoinHandle<Result<CostMatrix, LivewireError>>),
    Ready(Result<CostMatrix, LivewireError>),
    Taken,
}

/// Handle to a cost-matrix build running off the calling thread.
#[derive(Debug)]
pub struct CostMatrixWorker {
    guard: GenerationGuard,
    state: WorkerState,
}

impl CostMatrixWorker {
    /// Start building the cost matrix of `image`.
    ///
    /// If the platform cannot spawn threads the build runs synchronously
    /// before this returns.
    #[must_use]
    pub fn spawn(image: DynamicImage, weights: CostWeights, guard: GenerationGuard) -> Self {
        let generation = guard.issued();
        let image = Arc::new(image);
        let shared = Arc::clone(&image);
        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                log::debug!("building cost matrix for generation {generation}");
                CostMatrix::build(&shared, weights)
            });
        let state = match spawned {
            Ok(handle) => WorkerState::Running(handle),
            Err(e) => {
                log::warn!("cannot spawn {THREAD_NAME} thread ({e}); building inline");
                WorkerState::Ready(CostMatrix::build(&image, weights))
            }
        };
        Self { guard, state }
    }

    /// Build synchronously, producing an already-finished worker.
    #[must_use]
    pub fn inline(image: &DynamicImage, weights: CostWeights, guard: GenerationGuard) -> Self {
        Self {
            guard,
            state: WorkerState::Ready(CostMatrix::build(image, weights)),
        }
    }

    /// Generation the build was requested with.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.guard.issued()
    }

    /// Whether the build has finished (or its result was already taken).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match &self.state {
            WorkerState::Running(handle) => handle.is_finished(),
            WorkerState::Ready(_) | WorkerState::Taken => true,
        }
    }

    /// The result, if the build has finished and it was not taken yet.
    pub fn try_take(&mut self) -> Option<BuildResult> {
        if !self.is_finished() {
            return None;
        }
        match std::mem::replace(&mut self.state, WorkerState::Taken) {
            WorkerState::Running(handle) => Some(self.finish(join(handle))),
            WorkerState::Ready(result) => Some(self.finish(result)),
            WorkerState::Taken => None,
        }
    }

    /// Block until the build finishes.
    ///
    /// A result that was already taken is reported as
    /// [`LivewireError::WorkerFailed`].
    #[must_use]
    pub fn wait(mut self) -> BuildResult {
        let result = match std::mem::replace(&mut self.state, WorkerState::Taken) {
            WorkerState::Running(handle) => join(handle),
            WorkerState::Ready(result) => result,
            WorkerState::Taken => Err(LivewireError::WorkerFailed(
                "result already taken".to_string(),
            )),
        };
        self.finish(result)
    }

    fn finish(&self, result: Result<CostMatrix, LivewireError>) -> BuildResult {
        BuildResult {
            guard: self.guard.clone(),
            result,
        }
    }
}

fn join(handle: JoinHandle<Result<CostMatrix, LivewireError>>) -> Result<CostMatrix, LivewireError> {
    handle.join().unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        log::error!("{THREAD_NAME} thread panicked: {message}");
        Err(LivewireError::WorkerFailed(format!("thread panicked: {message}")))
    })
}
