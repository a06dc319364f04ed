use serde::{Deserialize, Serialize};

use crate::anchors::Anchors;
use crate::bounds::NoveltyBounds;
use crate::item::ModalityScore;
use crate::matrix::Matrix;
use crate::scorer::{self, RowScore};
use crate::weights::{ati_from_ds, ModalityWeights};
use crate::Result;

/// Frozen per-modality state: anchors, novelty bounds, phase-1 weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityModel {
    pub anchors: Anchors,
    pub bounds: NoveltyBounds,
    pub weights: ModalityWeights,
}

impl ModalityModel {
    /// Turn a raw row score into the final modality score.
    ///
    /// Training and inference both end here, which is what keeps the two
    /// paths numerically identical.
    #[inline]
    pub fn finish(&self, row: &RowScore) -> ModalityScore {
        let novelty = self.bounds.apply(row.novelty_raw);
        let ds = self.weights.distinctiveness(novelty, row.diversity);
        ModalityScore {
            novelty,
            diversity: row.diversity,
            ds,
            ati: ati_from_ds(ds),
        }
    }

    pub fn score_vector(&self, vector: &[f32], tau: f32) -> Result<ModalityScore> {
        let (row, _) = scorer::score_row(vector, &self.anchors, tau)?;
        Ok(self.finish(&row))
    }

    pub fn score_matrix(&self, vectors: &Matrix, tau: f32) -> Result<Vec<ModalityScore>> {
        let raw = scorer::score(vectors, &self.anchors, tau)?;
        Ok(raw
            .novelty_raw
            .iter()
            .zip(raw.diversity.iter())
            .zip(raw.nearest.iter())
            .map(|((n, d), k)| {
                self.finish(&RowScore {
                    novelty_raw: *n,
                    diversity: *d,
                    nearest: *k,
                })
            })
            .collect())
    }
}
