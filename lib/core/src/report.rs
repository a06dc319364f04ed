//! Flat per-post rows and per-brand aggregates for downstream reporting.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::item::ItemScore;

/// One row per post. Field names are stable so the row can be written to any
/// tabular format without a mapping layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostScoreRow {
    pub post_id: String,
    pub brand: String,
    pub y: f64,
    pub text_novelty: f32,
    pub text_diversity: f32,
    pub text_ds: f32,
    pub text_ati: f32,
    pub image_novelty: f32,
    pub image_diversity: f32,
    pub image_ds: f32,
    pub image_ati: f32,
    pub metadata_novelty: f32,
    pub metadata_diversity: f32,
    pub metadata_ds: f32,
    pub metadata_ati: f32,
    pub ds_final: f32,
    pub ati_final: f32,
    pub is_late_entry_brand: bool,
}

impl PostScoreRow {
    pub fn new(
        post_id: impl Into<String>,
        brand: impl Into<String>,
        y: f64,
        score: &ItemScore,
        is_late_entry_brand: bool,
    ) -> Self {
        let m = &score.modalities;
        Self {
            post_id: post_id.into(),
            brand: brand.into(),
            y,
            text_novelty: m.text.novelty,
            text_diversity: m.text.diversity,
            text_ds: m.text.ds,
            text_ati: m.text.ati,
            image_novelty: m.image.novelty,
            image_diversity: m.image.diversity,
            image_ds: m.image.ds,
            image_ati: m.image.ati,
            metadata_novelty: m.metadata.novelty,
            metadata_diversity: m.metadata.diversity,
            metadata_ds: m.metadata.ds,
            metadata_ati: m.metadata.ati,
            ds_final: score.ds_final,
            ati_final: score.ati_final,
            is_late_entry_brand,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandAggregate {
    pub brand: String,
    pub n_posts: usize,
    pub ati_final_mean: f64,
    pub ds_final_mean: f64,
    pub y_mean: f64,
    pub late_entry_brand: bool,
}

#[derive(Default)]
struct Accumulator {
    n: usize,
    ati: f64,
    ds: f64,
    y: f64,
    late: bool,
}

/// Group rows by brand. Output is sorted by brand name.
pub fn aggregate_by_brand(rows: &[PostScoreRow]) -> Vec<BrandAggregate> {
    let mut groups: AHashMap<&str, Accumulator> = AHashMap::new();
    for row in rows {
        let acc = groups.entry(row.brand.as_str()).or_default();
        acc.n += 1;
        acc.ati += row.ati_final as f64;
        acc.ds += row.ds_final as f64;
        acc.y += row.y;
        acc.late |= row.is_late_entry_brand;
    }

    let mut out: Vec<BrandAggregate> = groups
        .into_iter()
        .map(|(brand, acc)| {
            let n = acc.n as f64;
            BrandAggregate {
                brand: brand.to_string(),
                n_posts: acc.n,
                ati_final_mean: acc.ati / n,
                ds_final_mean: acc.ds / n,
                y_mean: acc.y / n,
                late_entry_brand: acc.late,
            }
        })
        .collect();
    out.sort_by(|a, b| a.brand.cmp(&b.brand));
    out
}
