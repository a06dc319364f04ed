//! Engagement target and per-brand sample weights.

use ahash::{AHashMap, AHashSet};

/// Guards against brands with zero followers.
pub const FOLLOWER_EPS: f64 = 0.01;
/// Weight of one comment relative to one like.
pub const COMMENT_WEIGHT: f64 = 5.0;

/// `y = (likes + 5·comments) / (followers + 0.01)`.
pub fn engagement_target(likes: f64, comments: f64, followers: f64) -> f64 {
    (likes + COMMENT_WEIGHT * comments) / (followers + FOLLOWER_EPS)
}

/// `1 / sqrt(post count of the brand)` for each post, so prolific brands do
/// not dominate the regressions.
pub fn brand_sample_weights<S: AsRef<str>>(brands: &[S]) -> Vec<f64> {
    let mut counts: AHashMap<&str, usize> = AHashMap::new();
    for brand in brands {
        *counts.entry(brand.as_ref()).or_insert(0) += 1;
    }
    brands
        .iter()
        .map(|b| {
            let n = counts.get(b.as_ref()).copied().unwrap_or(1);
            1.0 / (n as f64).sqrt()
        })
        .collect()
}

/// Brands that appear in the scoring split but never in training, sorted.
pub fn late_entry_brands<S: AsRef<str>>(train_brands: &[S], test_brands: &[S]) -> Vec<String> {
    let known: AHashSet<&str> = train_brands.iter().map(|b| b.as_ref()).collect();
    let mut late: Vec<String> = test_brands
        .iter()
        .map(|b| b.as_ref())
        .filter(|b| !known.contains(b))
        .collect::<AHashSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    late.sort();
    late
}
