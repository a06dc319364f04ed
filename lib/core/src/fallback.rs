//! Process-wide counters for absorbed numeric fallbacks.
//!
//! Degenerate inputs (near-duplicate training sets, all-negative regression
//! coefficients) are handled with fixed defaults instead of errors. Each
//! occurrence is logged and counted here so it stays observable.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static DEGENERATE_BOUNDS: AtomicU64 = AtomicU64::new(0);
static PHASE1_EQUAL_WEIGHTS: AtomicU64 = AtomicU64::new(0);
static PHASE2_EQUAL_WEIGHTS: AtomicU64 = AtomicU64::new(0);
static EMPTY_CLUSTER_RESEEDS: AtomicU64 = AtomicU64::new(0);
static DUPLICATE_SEEDS: AtomicU64 = AtomicU64::new(0);
static SINGULAR_COLUMNS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Training novelty spread below epsilon; normalized novelty pinned to 0.
    DegenerateBounds,
    /// Both phase-1 coefficients clipped to 0; weights set to (0.5, 0.5).
    Phase1EqualWeights,
    /// All phase-2 coefficients clipped to 0; weights set to thirds.
    Phase2EqualWeights,
    /// A k-means cluster lost all members and was re-seeded.
    EmptyClusterReseed,
    /// k-means++ found no spread left and seeded a duplicate centroid.
    DuplicateSeed,
    /// A regression predictor was collinear or constant; its coefficient is 0.
    SingularColumn,
}

impl Fallback {
    fn counter(self) -> &'static AtomicU64 {
        match self {
            Fallback::DegenerateBounds => &DEGENERATE_BOUNDS,
            Fallback::Phase1EqualWeights => &PHASE1_EQUAL_WEIGHTS,
            Fallback::Phase2EqualWeights => &PHASE2_EQUAL_WEIGHTS,
            Fallback::EmptyClusterReseed => &EMPTY_CLUSTER_RESEEDS,
            Fallback::DuplicateSeed => &DUPLICATE_SEEDS,
            Fallback::SingularColumn => &SINGULAR_COLUMNS,
        }
    }
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackSnapshot {
    pub degenerate_bounds: u64,
    pub phase1_equal_weights: u64,
    pub phase2_equal_weights: u64,
    pub empty_cluster_reseeds: u64,
    pub duplicate_seeds: u64,
    pub singular_columns: u64,
}

pub struct FallbackCounters;

impl FallbackCounters {
    #[inline]
    pub fn record(kind: Fallback) {
        kind.counter().fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(kind: Fallback) -> u64 {
        kind.counter().load(Ordering::Relaxed)
    }

    pub fn snapshot() -> FallbackSnapshot {
        FallbackSnapshot {
            degenerate_bounds: Self::get(Fallback::DegenerateBounds),
            phase1_equal_weights: Self::get(Fallback::Phase1EqualWeights),
            phase2_equal_weights: Self::get(Fallback::Phase2EqualWeights),
            empty_cluster_reseeds: Self::get(Fallback::EmptyClusterReseed),
            duplicate_seeds: Self::get(Fallback::DuplicateSeed),
            singular_columns: Self::get(Fallback::SingularColumn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_increments() {
        // Counters are process-wide; only assert monotonic growth.
        let before = FallbackCounters::get(Fallback::DuplicateSeed);
        FallbackCounters::record(Fallback::DuplicateSeed);
        assert!(FallbackCounters::get(Fallback::DuplicateSeed) > before);
        assert!(FallbackCounters::snapshot().duplicate_seeds > before);
    }
}
