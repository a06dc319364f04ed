//! Weighted ordinary least squares with an intercept.
//!
//! Solves the centred normal equations `(XᵀWX) β = XᵀW y` by Gaussian
//! elimination with partial pivoting. A predictor that is constant or
//! collinear with earlier ones has no usable pivot; its coefficient is fixed
//! at 0 and the remaining system is solved as usual.

use tracing::warn;

use crate::fallback::{Fallback, FallbackCounters};
use crate::{Error, Result};

/// Relative pivot threshold below which a column is treated as singular.
const PIVOT_EPS: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Indices of predictors whose coefficient was pinned to 0.
    pub singular: Vec<usize>,
}

impl LinearFit {
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x.iter())
                .map(|(b, v)| b * v)
                .sum::<f64>()
    }
}

/// Fit `y ≈ intercept + Σ βⱼ·columns[j]`, optionally weighted per sample.
pub fn weighted_least_squares(
    columns: &[&[f32]],
    y: &[f64],
    sample_weight: Option<&[f64]>,
) -> Result<LinearFit> {
    let n = y.len();
    let p = columns.len();
    if n == 0 {
        return Err(Error::Configuration("regression needs at least one sample".to_string()));
    }
    if p == 0 {
        return Err(Error::Configuration("regression needs at least one predictor".to_string()));
    }
    for (j, col) in columns.iter().enumerate() {
        if col.len() != n {
            return Err(Error::Configuration(format!(
                "predictor {} has {} values for {} targets",
                j,
                col.len(),
                n
            )));
        }
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput("regression target contains non-finite values".to_string()));
    }

    let weights: Vec<f64> = match sample_weight {
        Some(w) => {
            if w.len() != n {
                return Err(Error::Configuration(format!(
                    "{} sample weights for {} targets",
                    w.len(),
                    n
                )));
            }
            if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(Error::InvalidInput(
                    "sample weights must be finite and non-negative".to_string(),
                ));
            }
            w.to_vec()
        }
        None => vec![1.0; n],
    };
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum <= 0.0 {
        return Err(Error::InvalidInput("sample weights sum to zero".to_string()));
    }

    let x_mean: Vec<f64> = columns
        .iter()
        .map(|col| {
            col.iter()
                .zip(weights.iter())
                .map(|(x, w)| *x as f64 * w)
                .sum::<f64>()
                / weight_sum
        })
        .collect();
    let y_mean = y.iter().zip(weights.iter()).map(|(v, w)| v * w).sum::<f64>() / weight_sum;

    // Augmented normal matrix [XᵀWX | XᵀWy] on centred data.
    let mut a = vec![vec![0.0f64; p + 1]; p];
    for i in 0..n {
        let w = weights[i];
        if w == 0.0 {
            continue;
        }
        let yc = y[i] - y_mean;
        for r in 0..p {
            let xr = columns[r][i] as f64 - x_mean[r];
            for c in 0..p {
                a[r][c] += w * xr * (columns[c][i] as f64 - x_mean[c]);
            }
            a[r][p] += w * xr * yc;
        }
    }

    let (coefficients, singular) = solve_normal_equations(a);
    for j in &singular {
        FallbackCounters::record(Fallback::SingularColumn);
        warn!(predictor = *j, "regression predictor is constant or collinear; coefficient set to 0");
    }

    let intercept = y_mean
        - coefficients
            .iter()
            .zip(x_mean.iter())
            .map(|(b, m)| b * m)
            .sum::<f64>();

    Ok(LinearFit {
        coefficients,
        intercept,
        singular,
    })
}

/// Gaussian elimination on an augmented `p × (p+1)` system. Columns without
/// a usable pivot become free variables fixed at 0.
fn solve_normal_equations(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<usize>) {
    let p = a.len();
    let scale = (0..p).map(|i| a[i][i].abs()).fold(0.0f64, f64::max).max(f64::MIN_POSITIVE);
    let threshold = PIVOT_EPS * scale;

    let mut pivot_row_of = vec![None; p];
    let mut singular = Vec::new();
    let mut row = 0usize;

    for col in 0..p {
        let best = (row..p).max_by(|&x, &y| {
            a[x][col]
                .abs()
                .partial_cmp(&a[y][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let pivot = match best {
            Some(r) if a[r][col].abs() > threshold => r,
            _ => {
                singular.push(col);
                continue;
            }
        };
        a.swap(row, pivot);
        for r in 0..p {
            if r == row {
                continue;
            }
            let factor = a[r][col] / a[row][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..=p {
                a[r][c] -= factor * a[row][c];
            }
        }
        pivot_row_of[col] = Some(row);
        row += 1;
    }

    let coefficients = (0..p)
        .map(|col| match pivot_row_of[col] {
            // Free columns are 0, so only the pivot contributes.
            Some(r) => a[r][p] / a[r][col],
            None => 0.0,
        })
        .collect();
    (coefficients, singular)
}
