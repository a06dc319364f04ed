//! Metadata scaler: per-feature z-score plus a cross-modality balancing factor.
//!
//! Raw hand-crafted metadata features live on arbitrary scales. They are
//! z-scored with training statistics and then multiplied by `balance`, chosen
//! so the mean metadata norm is a fixed fraction of the mean semantic
//! (text ⊕ image) norm.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matrix::Matrix;
use crate::vector::{norm, norm_squared};
use crate::{Error, Result};

const NORM_GUARD: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataScaler {
    pub mean: Vec<f64>,
    /// Population standard deviation; 1 for constant features.
    pub scale: Vec<f64>,
    pub balance: f64,
}

impl MetadataScaler {
    /// Fit on training rows only.
    ///
    /// `semantic_norm_mean` is the mean L2 norm of the concatenated text and
    /// image vectors of the same training rows (see [`mean_joint_norm`]).
    pub fn fit(raw: &Matrix, semantic_norm_mean: f64, ratio: f64) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::Configuration(
                "cannot fit metadata scaler on an empty training set".to_string(),
            ));
        }
        let n = raw.rows() as f64;
        let cols = raw.cols();

        let mut mean = vec![0.0f64; cols];
        for row in raw.iter_rows() {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += *x as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0f64; cols];
        for row in raw.iter_rows() {
            for ((v, x), m) in var.iter_mut().zip(row).zip(mean.iter()) {
                let d = *x as f64 - m;
                *v += d * d;
            }
        }
        let scale: Vec<f64> = var
            .iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        let unbalanced = Self {
            mean,
            scale,
            balance: 1.0,
        };
        let z_norm_mean = raw
            .iter_rows()
            .map(|row| norm(&unbalanced.standardize(row)) as f64 + NORM_GUARD)
            .sum::<f64>()
            / n;
        let balance = ratio * (semantic_norm_mean / (z_norm_mean + NORM_GUARD));
        debug!(semantic_norm_mean, z_norm_mean, balance, "metadata scaler fitted");

        Ok(Self { balance, ..unbalanced })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(Error::InvalidInput(format!(
                "metadata scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        let finite = self.mean.iter().chain(self.scale.iter()).all(|v| v.is_finite());
        if !finite || self.scale.iter().any(|s| *s <= 0.0) || !self.balance.is_finite() {
            return Err(Error::InvalidInput("metadata scaler holds invalid parameters".to_string()));
        }
        Ok(())
    }

    /// Scale one raw feature row: `(x − mean) / scale · balance`.
    pub fn transform_row(&self, raw: &[f32]) -> Result<Vec<f32>> {
        if raw.len() != self.dim() {
            return Err(Error::mismatch("metadata feature count", self.dim(), raw.len()));
        }
        Ok(self
            .standardize(raw)
            .into_iter()
            .map(|z| (z as f64 * self.balance) as f32)
            .collect())
    }

    pub fn transform(&self, raw: &Matrix) -> Result<Matrix> {
        let rows = raw
            .iter_rows()
            .map(|row| self.transform_row(row))
            .collect::<Result<Vec<_>>>()?;
        Matrix::from_flat(raw.rows(), self.dim(), rows.concat())
    }

    fn standardize(&self, raw: &[f32]) -> Vec<f32> {
        raw.iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (m, s))| ((*x as f64 - m) / s) as f32)
            .collect()
    }
}

/// Mean over rows of ‖a_i ⊕ b_i‖.
pub fn mean_joint_norm(a: &Matrix, b: &Matrix) -> Result<f64> {
    if a.rows() != b.rows() {
        return Err(Error::Configuration(format!(
            "row count mismatch: {} vs {}",
            a.rows(),
            b.rows()
        )));
    }
    if a.is_empty() {
        return Ok(0.0);
    }
    let total: f64 = a
        .iter_rows()
        .zip(b.iter_rows())
        .map(|(x, y)| ((norm_squared(x) + norm_squared(y)) as f64).sqrt())
        .sum();
    Ok(total / a.rows() as f64)
}
