use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fallback::{Fallback, FallbackCounters};
use crate::{Error, Result};

/// Spread below which training novelty is treated as constant.
pub const BOUNDS_EPS: f32 = 1e-9;

/// Min/max of raw training novelty, frozen for min-max scaling at train and
/// inference time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoveltyBounds {
    pub min: f32,
    pub max: f32,
}

impl NoveltyBounds {
    /// Fit from raw training novelty only.
    pub fn fit(raw_novelty: &[f32]) -> Result<Self> {
        if raw_novelty.is_empty() {
            return Err(Error::Configuration(
                "cannot fit novelty bounds on an empty training set".to_string(),
            ));
        }
        let (min, max) = raw_novelty
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), x| (lo.min(*x), hi.max(*x)));
        let bounds = Self { min, max };
        bounds.validate()?;
        if bounds.is_degenerate() {
            FallbackCounters::record(Fallback::DegenerateBounds);
            warn!(min, max, "training novelty has no spread; normalized novelty will be 0");
        }
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(Error::InvalidInput(format!(
                "invalid novelty bounds ({}, {})",
                self.min, self.max
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.max - self.min < BOUNDS_EPS
    }

    /// Scale into `[0, 1]`. Values outside the training range are clipped,
    /// never extrapolated.
    #[inline]
    pub fn apply(&self, raw: f32) -> f32 {
        if self.is_degenerate() {
            return 0.0;
        }
        ((raw - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }

    pub fn apply_all(&self, raw: &[f32]) -> Vec<f32> {
        raw.iter().map(|x| self.apply(*x)).collect()
    }
}
