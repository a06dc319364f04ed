//! Anchor fitting: mini-batch k-means over one modality's training vectors.
//!
//! Centroids are seeded with k-means++ from a seeded `StdRng`, refined with
//! per-centre learning rates (1 / points seen so far), then L2-normalized.
//! The fitter never returns fewer than `k` anchors.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::KMeansParams;
use crate::fallback::{Fallback, FallbackCounters};
use crate::matrix::Matrix;
use crate::vector::{dot, l2_normalize};
use crate::{Error, Result};

/// `k` unit-norm centroids for one modality. Immutable once fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchors {
    centroids: Matrix,
}

impl Anchors {
    /// Wrap centroids, normalizing every row to unit length.
    pub fn new(centroids: Matrix) -> Result<Self> {
        if centroids.is_empty() || centroids.cols() == 0 {
            return Err(Error::Configuration(
                "anchor set must hold at least one non-empty centroid".to_string(),
            ));
        }
        let mut centroids = centroids;
        for i in 0..centroids.rows() {
            l2_normalize(centroids.row_mut(i));
        }
        Ok(Self { centroids })
    }

    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        Self::new(Matrix::from_rows(rows)?)
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.centroids.rows()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.centroids.cols()
    }

    #[inline]
    pub fn get(&self, i: usize) -> &[f32] {
        self.centroids.row(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.centroids.iter_rows()
    }
}

/// Cluster `vectors` into exactly `k` unit-normalized anchors.
///
/// Deterministic for a fixed `seed`. Fails with a configuration error when
/// `k < 2`, the set is empty, or there are fewer vectors than anchors.
pub fn fit_anchors(vectors: &Matrix, k: usize, params: &KMeansParams, seed: u64) -> Result<Anchors> {
    if k < 2 {
        return Err(Error::Configuration(format!("k must be >= 2, got {}", k)));
    }
    if vectors.is_empty() || vectors.cols() == 0 {
        return Err(Error::Configuration("empty training set".to_string()));
    }
    let n = vectors.rows();
    if n < k {
        return Err(Error::Configuration(format!(
            "cannot fit {} anchors from {} training vectors",
            k, n
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = kmeans_plus_plus(vectors, k, &mut rng);
    let mut counts = vec![0u64; k];
    let batch_size = params.batch_size.min(n);

    for iteration in 0..params.max_iter {
        let batch: Vec<usize> = if batch_size == n {
            (0..n).collect()
        } else {
            index::sample(&mut rng, n, batch_size).into_vec()
        };

        // Assign against the centres as they stood at the start of the batch.
        let assignments: Vec<usize> = batch
            .iter()
            .map(|&i| nearest_center(vectors.row(i), &centers).0)
            .collect();

        let previous = centers.clone();
        for (&i, &c) in batch.iter().zip(assignments.iter()) {
            counts[c] += 1;
            let eta = 1.0 / counts[c] as f32;
            for (cv, x) in centers[c].iter_mut().zip(vectors.row(i)) {
                *cv += eta * (x - *cv);
            }
        }

        let shift: f32 = previous
            .iter()
            .zip(centers.iter())
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        if shift <= params.tolerance {
            debug!(iteration, shift, "k-means converged");
            break;
        }
    }

    reseed_empty_clusters(vectors, &mut centers, &counts);

    Anchors::from_rows(&centers)
}

/// k-means++ seeding: each next centre is drawn with probability ∝ D(x)².
fn kmeans_plus_plus(vectors: &Matrix, k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let n = vectors.rows();
    let mut centers: Vec<Vec<f32>> = Vec::with_capacity(k);
    let first = rng.random_range(0..n);
    centers.push(vectors.row(first).to_vec());

    let mut min_d2: Vec<f64> = vectors
        .iter_rows()
        .map(|row| squared_distance(row, &centers[0]) as f64)
        .collect();

    while centers.len() < k {
        let total: f64 = min_d2.iter().sum();
        let next = if total > 0.0 && total.is_finite() {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = min_d2.iter().rposition(|d| *d > 0.0).unwrap_or(0);
            for (i, d) in min_d2.iter().enumerate() {
                if *d <= 0.0 {
                    continue;
                }
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= *d;
            }
            chosen
        } else {
            FallbackCounters::record(Fallback::DuplicateSeed);
            warn!(
                seeded = centers.len(),
                k, "training vectors have no spread left; seeding a duplicate anchor"
            );
            rng.random_range(0..n)
        };

        let center = vectors.row(next).to_vec();
        for (d, row) in min_d2.iter_mut().zip(vectors.iter_rows()) {
            let candidate = squared_distance(row, &center) as f64;
            if candidate < *d {
                *d = candidate;
            }
        }
        centers.push(center);
    }

    centers
}

/// Move every centre that never received a point onto the vector farthest
/// from its current nearest centre.
fn reseed_empty_clusters(vectors: &Matrix, centers: &mut [Vec<f32>], counts: &[u64]) {
    for c in 0..centers.len() {
        if counts[c] > 0 {
            continue;
        }
        let farthest = vectors
            .iter_rows()
            .enumerate()
            .map(|(i, row)| (i, nearest_center(row, centers).1))
            .fold((0usize, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
        FallbackCounters::record(Fallback::EmptyClusterReseed);
        warn!(cluster = c, point = farthest.0, "empty k-means cluster re-seeded");
        centers[c] = vectors.row(farthest.0).to_vec();
    }
}

/// Index of and squared distance to the closest centre; ties go to the lower index.
fn nearest_center(row: &[f32], centers: &[Vec<f32>]) -> (usize, f32) {
    let mut best = (0usize, f32::INFINITY);
    for (c, center) in centers.iter().enumerate() {
        let d = squared_distance(row, center);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

#[inline]
fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    // ‖a − b‖² expanded keeps the hot loop on the shared dot kernel.
    let d = dot(a, a) - 2.0 * dot(a, b) + dot(b, b);
    d.max(0.0)
}
