//! Correlation of scores with the engagement target.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::report::PostScoreRow;

/// Pearson correlation. `None` for fewer than two points, mismatched lengths
/// or a constant column.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (da, db) = (a - mx, b - my);
        sxy += da * db;
        sxx += da * da;
        syy += db * db;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

/// 1-based ranks; ties share the average of their positions.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by_key(|&i| OrderedFloat(values[i]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end hold ranks start+1..=end.
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

/// Spearman rank correlation: Pearson on average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    pearson(&average_ranks(x), &average_ranks(y))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileBin {
    pub bin: usize,
    pub count: usize,
    pub score_mean: f64,
    pub y_mean: f64,
}

/// Equal-frequency bins by ascending score. Bin `i` holds items whose sorted
/// position `p` satisfies `p * bins / n == i`.
pub fn quantile_summary(scores: &[f64], y: &[f64], bins: usize) -> Vec<QuantileBin> {
    let n = scores.len().min(y.len());
    if n == 0 || bins == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| OrderedFloat(scores[i]));

    let mut out: Vec<QuantileBin> = (0..bins.min(n))
        .map(|bin| QuantileBin {
            bin,
            count: 0,
            score_mean: 0.0,
            y_mean: 0.0,
        })
        .collect();
    let effective = out.len();
    for (pos, &i) in order.iter().enumerate() {
        let b = &mut out[pos * effective / n];
        b.count += 1;
        b.score_mean += scores[i];
        b.y_mean += y[i];
    }
    for b in &mut out {
        b.score_mean /= b.count as f64;
        b.y_mean /= b.count as f64;
    }
    out
}

pub fn deciles(scores: &[f64], y: &[f64]) -> Vec<QuantileBin> {
    quantile_summary(scores, y, 10)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub metric: String,
    pub n: usize,
    pub pearson: Option<f64>,
    pub spearman: Option<f64>,
}

/// Correlate each score column of the report with `y`.
pub fn correlate_rows(rows: &[PostScoreRow]) -> Vec<Correlation> {
    type Column = fn(&PostScoreRow) -> f32;
    let columns: [(&str, Column); 5] = [
        ("text_ds", |r| r.text_ds),
        ("image_ds", |r| r.image_ds),
        ("metadata_ds", |r| r.metadata_ds),
        ("ds_final", |r| r.ds_final),
        ("ati_final", |r| r.ati_final),
    ];

    let y: Vec<f64> = rows.iter().map(|r| r.y).collect();
    columns
        .iter()
        .map(|(name, get)| {
            let x: Vec<f64> = rows.iter().map(|r| get(r) as f64).collect();
            Correlation {
                metric: name.to_string(),
                n: rows.len(),
                pearson: pearson(&x, &y),
                spearman: spearman(&x, &y),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pearson_perfect_and_inverse() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &[4.0, 3.0, 2.0, 1.0]).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson(&x, &[1.0; 4]).is_none());
        assert!(pearson(&[1.0], &[1.0]).is_none());
    }

    #[test]
    fn test_average_ranks_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn test_spearman_monotone() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 8.0, 27.0, 64.0, 125.0];
        assert!((spearman(&x, &y).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_deciles_cover_all_items() {
        let scores: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let y: Vec<f64> = scores.iter().map(|s| s * 2.0).collect();
        let bins = deciles(&scores, &y);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 25);
        assert!(bins.windows(2).all(|w| w[0].score_mean < w[1].score_mean));
        assert!((bins[0].y_mean - 2.0 * bins[0].score_mean).abs() < 1e-12);
    }

    #[test]
    fn test_fewer_items_than_bins() {
        let bins = quantile_summary(&[0.3, 0.1], &[1.0, 2.0], 10);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].y_mean, 2.0);
    }
}
