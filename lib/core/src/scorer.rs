//! Novelty and diversity of items relative to a modality's anchors.
//!
//! Novelty is `1 − max cosine similarity` to any anchor. Diversity is the
//! Shannon entropy of `softmax(similarities / tau)`, divided by `ln k`.
//! Novelty leaves this module raw: callers scale it with the training-time
//! [`NoveltyBounds`](crate::bounds::NoveltyBounds).
//!
//! With a single anchor the entropy is always 0 and `ln 1 = 0`; diversity is
//! defined as 0 in that case.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::anchors::Anchors;
use crate::matrix::Matrix;
use crate::vector::{dot, l2_normalized};
use crate::{Error, Result};

const TAU_FLOOR: f32 = 1e-8;
const PROB_EPS: f32 = 1e-9;
const LOG_K_EPS: f32 = 1e-9;

/// Per-item result of scoring one vector against the anchors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowScore {
    pub novelty_raw: f32,
    pub diversity: f32,
    /// Index of the most similar anchor.
    pub nearest: usize,
}

/// Batch result: one entry per input row.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScores {
    pub novelty_raw: Vec<f32>,
    pub diversity: Vec<f32>,
    pub nearest: Vec<usize>,
    /// Cosine similarities, `n × k`.
    pub similarities: Matrix,
}

/// Cosine similarity of one (unnormalized) vector against every anchor.
pub fn similarities(vector: &[f32], anchors: &Anchors) -> Vec<f32> {
    let unit = l2_normalized(vector);
    anchors.iter().map(|anchor| dot(&unit, anchor)).collect()
}

/// Score a single vector. The batch path calls this for every row.
pub fn score_row(vector: &[f32], anchors: &Anchors, tau: f32) -> Result<(RowScore, Vec<f32>)> {
    if vector.len() != anchors.dim() {
        return Err(Error::InvalidDimension {
            expected: anchors.dim(),
            actual: vector.len(),
        });
    }
    let sims = similarities(vector, anchors);
    let (nearest, max_sim) = argmax(&sims);
    let score = RowScore {
        novelty_raw: 1.0 - max_sim,
        diversity: normalized_entropy(&sims, tau),
        nearest,
    };
    Ok((score, sims))
}

/// Score every row of `vectors` against `anchors`.
pub fn score(vectors: &Matrix, anchors: &Anchors, tau: f32) -> Result<RawScores> {
    if !vectors.is_empty() && vectors.cols() != anchors.dim() {
        return Err(Error::InvalidDimension {
            expected: anchors.dim(),
            actual: vectors.cols(),
        });
    }

    let per_row: Vec<(RowScore, Vec<f32>)> = (0..vectors.rows())
        .into_par_iter()
        .map(|i| score_row(vectors.row(i), anchors, tau))
        .collect::<Result<_>>()?;

    let k = anchors.k();
    let mut novelty_raw = Vec::with_capacity(per_row.len());
    let mut diversity = Vec::with_capacity(per_row.len());
    let mut nearest = Vec::with_capacity(per_row.len());
    let mut flat = Vec::with_capacity(per_row.len() * k);
    for (row, sims) in per_row {
        novelty_raw.push(row.novelty_raw);
        diversity.push(row.diversity);
        nearest.push(row.nearest);
        flat.extend_from_slice(&sims);
    }

    Ok(RawScores {
        similarities: Matrix::from_flat(novelty_raw.len(), k, flat)?,
        novelty_raw,
        diversity,
        nearest,
    })
}

/// Temperature-scaled softmax, shifted by the row max for stability.
pub fn softmax(values: &[f32], tau: f32) -> Vec<f32> {
    if values.is_empty() {
        return Vec::new();
    }
    let tau = tau.max(TAU_FLOOR);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| ((v - max) / tau).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / (sum + PROB_EPS)).collect()
}

/// Entropy of `softmax(sims / tau)` divided by `ln k`, clamped to `[0, 1]`.
pub fn normalized_entropy(sims: &[f32], tau: f32) -> f32 {
    let k = sims.len();
    if k < 2 {
        return 0.0;
    }
    let entropy: f32 = softmax(sims, tau)
        .iter()
        .map(|p| -p * (p + PROB_EPS).ln())
        .sum();
    (entropy / ((k as f32).ln() + LOG_K_EPS)).clamp(0.0, 1.0)
}

fn argmax(values: &[f32]) -> (usize, f32) {
    let mut best = (0usize, f32::NEG_INFINITY);
    for (i, v) in values.iter().enumerate() {
        if *v > best.1 {
            best = (i, *v);
        }
    }
    if best.1.is_finite() {
        best
    } else {
        (0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis_anchors() -> Anchors {
        Anchors::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap()
    }

    #[test]
    fn test_item_on_anchor_has_zero_novelty() {
        let (row, sims) = score_row(&[1.0, 0.0], &axis_anchors(), 1.0).unwrap();
        assert!(row.novelty_raw.abs() < 1e-6);
        assert_eq!(row.nearest, 0);
        assert!((sims[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_equidistant_item_has_max_diversity() {
        let (row, _) = score_row(&[0.707, 0.707], &axis_anchors(), 1.0).unwrap();
        assert!((row.novelty_raw - (1.0 - 0.707_106_8)).abs() < 1e-4);
        assert!((row.diversity - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_sharp_tau_lowers_diversity_near_one_anchor() {
        let anchors = axis_anchors();
        let (sharp, _) = score_row(&[0.9, 0.1], &anchors, 0.07).unwrap();
        let (soft, _) = score_row(&[0.9, 0.1], &anchors, 10.0).unwrap();
        assert!(sharp.diversity < 0.01);
        assert!(soft.diversity > sharp.diversity);
    }

    #[test]
    fn test_orthogonal_item_approaches_novelty_one() {
        let anchors = Anchors::from_rows(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]).unwrap();
        let (row, _) = score_row(&[0.0, 0.0, 1.0], &anchors, 0.07).unwrap();
        assert!((row.novelty_raw - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_anchor_diversity_is_zero() {
        let anchors = Anchors::from_rows(&[vec![1.0, 0.0]]).unwrap();
        let (row, _) = score_row(&[0.5, 0.5], &anchors, 0.07).unwrap();
        assert_eq!(row.diversity, 0.0);
    }

    #[test]
    fn test_batch_matches_rows() {
        let anchors = axis_anchors();
        let vectors = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.3, 0.8], vec![0.0, 0.0]]).unwrap();
        let batch = score(&vectors, &anchors, 0.07).unwrap();
        assert_eq!(batch.similarities.rows(), 3);
        assert_eq!(batch.similarities.cols(), 2);
        for i in 0..3 {
            let (row, sims) = score_row(vectors.row(i), &anchors, 0.07).unwrap();
            assert_eq!(batch.novelty_raw[i], row.novelty_raw);
            assert_eq!(batch.diversity[i], row.diversity);
            assert_eq!(batch.similarities.row(i), sims.as_slice());
        }
        // Zero vector: all similarities 0, novelty 1, maximal spread.
        assert!((batch.novelty_raw[2] - 1.0).abs() < 1e-6);
        assert!((batch.diversity[2] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = score_row(&[1.0, 0.0, 0.0], &axis_anchors(), 0.07).unwrap_err();
        assert!(matches!(err, Error::InvalidDimension { expected: 2, actual: 3 }));
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[0.1, 0.5, -0.2], 0.07);
        let total: f32 = p.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }
}
