//! Phase-1 (within-modality) and phase-2 (cross-modality) weight learning.
//!
//! Both phases fit weighted OLS, clip negative coefficients to 0, then
//! renormalize to sum 1. The clip happens before the renormalization;
//! swapping the two changes the result. When every coefficient clips to 0
//! the weights fall back to an equal split.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fallback::{Fallback, FallbackCounters};
use crate::modality::PerModality;
use crate::regression::weighted_least_squares;
use crate::{Error, Result};

/// Coefficient mass below which clipped weights count as all-zero.
const ZERO_MASS_EPS: f64 = 1e-9;
/// Allowed drift of stored weights from the probability simplex.
pub const SIMPLEX_TOLERANCE: f32 = 1e-6;

/// Novelty/diversity trade-off of one modality. Non-negative, sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalityWeights {
    pub novelty: f32,
    pub diversity: f32,
}

impl ModalityWeights {
    pub const EQUAL: ModalityWeights = ModalityWeights {
        novelty: 0.5,
        diversity: 0.5,
    };

    /// DS = wN·novelty + wD·diversity, kept inside `[0, 1]`.
    #[inline]
    pub fn distinctiveness(&self, novelty: f32, diversity: f32) -> f32 {
        (self.novelty * novelty + self.diversity * diversity).clamp(0.0, 1.0)
    }

    pub fn validate(&self) -> Result<()> {
        check_simplex(&[self.novelty, self.diversity], "modality weights")
    }
}

/// Importance of each modality in the final score. Non-negative, sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub text: f32,
    pub image: f32,
    pub metadata: f32,
}

impl CompositeWeights {
    pub const EQUAL: CompositeWeights = CompositeWeights {
        text: 1.0 / 3.0,
        image: 1.0 / 3.0,
        metadata: 1.0 / 3.0,
    };

    /// DS_final = Σ v_m · DS_m, kept inside `[0, 1]`.
    #[inline]
    pub fn combine(&self, ds: &PerModality<f32>) -> f32 {
        (self.text * ds.text + self.image * ds.image + self.metadata * ds.metadata).clamp(0.0, 1.0)
    }

    pub fn as_per_modality(&self) -> PerModality<f32> {
        PerModality::new(self.text, self.image, self.metadata)
    }

    pub fn validate(&self) -> Result<()> {
        check_simplex(&[self.text, self.image, self.metadata], "composite weights")
    }
}

/// ATI = 100·(1 − DS).
#[inline]
pub fn ati_from_ds(ds: f32) -> f32 {
    100.0 * (1.0 - ds)
}

/// Clip to `>= 0` then scale to sum 1. `None` when nothing survives the clip.
pub fn clip_and_normalize(coefficients: &[f64]) -> Option<Vec<f64>> {
    let clipped: Vec<f64> = coefficients.iter().map(|c| c.max(0.0)).collect();
    let mass: f64 = clipped.iter().sum();
    if mass < ZERO_MASS_EPS || !mass.is_finite() {
        return None;
    }
    Some(clipped.iter().map(|c| c / mass).collect())
}

/// Learn (wN, wD) for one modality by regressing `target` on [novelty, diversity].
pub fn learn_phase1(
    novelty: &[f32],
    diversity: &[f32],
    target: &[f64],
    sample_weight: Option<&[f64]>,
) -> Result<ModalityWeights> {
    let fit = weighted_least_squares(&[novelty, diversity], target, sample_weight)?;
    debug!(coefficients = ?fit.coefficients, "phase-1 regression");

    match clip_and_normalize(&fit.coefficients) {
        Some(w) => Ok(ModalityWeights {
            novelty: w[0] as f32,
            diversity: w[1] as f32,
        }),
        None => {
            FallbackCounters::record(Fallback::Phase1EqualWeights);
            warn!(
                coefficients = ?fit.coefficients,
                "phase-1 coefficients all <= 0; using equal novelty/diversity weights"
            );
            Ok(ModalityWeights::EQUAL)
        }
    }
}

/// Learn (v_text, v_image, v_meta) by regressing `target` on the three modality DS columns.
pub fn learn_phase2(
    ds_text: &[f32],
    ds_image: &[f32],
    ds_metadata: &[f32],
    target: &[f64],
    sample_weight: Option<&[f64]>,
) -> Result<CompositeWeights> {
    let fit = weighted_least_squares(&[ds_text, ds_image, ds_metadata], target, sample_weight)?;
    debug!(coefficients = ?fit.coefficients, "phase-2 regression");

    match clip_and_normalize(&fit.coefficients) {
        Some(v) => Ok(CompositeWeights {
            text: v[0] as f32,
            image: v[1] as f32,
            metadata: v[2] as f32,
        }),
        None => {
            FallbackCounters::record(Fallback::Phase2EqualWeights);
            warn!(
                coefficients = ?fit.coefficients,
                "phase-2 coefficients all <= 0; using equal modality weights"
            );
            Ok(CompositeWeights::EQUAL)
        }
    }
}

fn check_simplex(values: &[f32], what: &str) -> Result<()> {
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(Error::InvalidInput(format!("{} must be finite and >= 0: {:?}", what, values)));
    }
    let sum: f32 = values.iter().sum();
    if (sum - 1.0).abs() > SIMPLEX_TOLERANCE {
        return Err(Error::InvalidInput(format!("{} must sum to 1, got {}", what, sum)));
    }
    Ok(())
}
