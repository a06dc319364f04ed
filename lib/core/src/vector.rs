//! Dense `f32` vector kernels.
//!
//! Every score in the engine goes through these functions on both the
//! training and the inference path, so they are plain scalar code with a
//! fixed summation order: the same input always produces the same bits,
//! independent of the host CPU.

/// Guard added to norms before dividing.
pub const NORM_EPS: f32 = 1e-9;

/// Dot product with two accumulators for better pipelining.
///
/// Slices of different length are truncated to the shorter one; callers
/// validate dimensions before reaching this kernel.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let mut acc0 = 0.0f32;
    let mut acc1 = 0.0f32;

    let a_chunks = a.chunks_exact(8);
    let b_chunks = b.chunks_exact(8);
    let tail = a_chunks.remainder().len();

    for (x, y) in a_chunks.zip(b_chunks) {
        acc0 += x[0] * y[0] + x[1] * y[1] + x[2] * y[2] + x[3] * y[3];
        acc1 += x[4] * y[4] + x[5] * y[5] + x[6] * y[6] + x[7] * y[7];
    }

    for i in (len - tail)..len {
        acc0 += a[i] * b[i];
    }

    acc0 + acc1
}

#[inline]
pub fn norm_squared(v: &[f32]) -> f32 {
    dot(v, v)
}

#[inline]
pub fn norm(v: &[f32]) -> f32 {
    norm_squared(v).sqrt()
}

/// Returns `v / (‖v‖ + NORM_EPS)`.
///
/// A zero vector stays zero. A vector whose squared norm overflows maps to
/// zero as well, so downstream similarities stay finite.
#[inline]
pub fn l2_normalized(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if !n.is_finite() {
        return vec![0.0; v.len()];
    }
    let inv = 1.0 / (n + NORM_EPS);
    v.iter().map(|x| x * inv).collect()
}

/// Normalize in place, same arithmetic as [`l2_normalized`].
#[inline]
pub fn l2_normalize(v: &mut [f32]) {
    let n = norm(v);
    if !n.is_finite() {
        v.iter_mut().for_each(|x| *x = 0.0);
        return;
    }
    let inv = 1.0 / (n + NORM_EPS);
    for x in v.iter_mut() {
        *x *= inv;
    }
}

/// Cosine similarity; zero when either side is the zero vector.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    dot(&l2_normalized(a), &l2_normalized(b))
}

/// Mean of up to `limit` vectors, L2-normalized. `None` when `vectors` is empty.
pub fn mean_pooled(vectors: &[Vec<f32>], limit: usize) -> Option<Vec<f32>> {
    let used: Vec<&Vec<f32>> = vectors.iter().take(limit).collect();
    let first = used.first()?;
    let dim = first.len();
    let mut sum = vec![0.0f32; dim];
    for v in &used {
        for (s, x) in sum.iter_mut().zip(v.iter()) {
            *s += *x;
        }
    }
    let count = used.len() as f32;
    sum.iter_mut().for_each(|s| *s /= count);
    l2_normalize(&mut sum);
    Some(sum)
}
