//! Progress reporting hooks for pipeline phases.
//!
//! The orchestrator opens one [`PhaseProgress`] per phase and hands it to
//! every worker in that phase, so callbacks are lexically scoped to the
//! phase instead of living in a mutable slot on a shared client. Counts are
//! advisory: increments from concurrent workers may interleave arbitrarily.

use std::sync::Arc;

/// Factory for per-phase progress handles.
///
/// Implemented by the CLI (terminal bars) and by [`NoProgress`] for library
/// use and tests.
pub trait Progress: Send + Sync {
    /// Begin a phase with `total` work items.
    fn start_phase(&self, desc: &str, total: usize) -> Arc<dyn PhaseProgress>;
}

/// Live handle for a single phase.
pub trait PhaseProgress: Send + Sync {
    /// Streaming throughput: `n` newline characters arrived in a delta.
    fn lines_received(&self, n: usize);

    /// One work item finished (successfully or not).
    fn item_done(&self);

    /// The phase has fully drained.
    fn finish(&self);
}

/// Silent implementation of both traits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start_phase(&self, _desc: &str, _total: usize) -> Arc<dyn PhaseProgress> {
        Arc::new(NoProgress)
    }
}

impl PhaseProgress for NoProgress {
    fn lines_received(&self, _n: usize) {}
    fn item_done(&self) {}
    fn finish(&self) {}
}
