use serde::{Deserialize, Serialize};

use crate::modality::{Modality, PerModality};

/// Materialized feature vectors of one post, as produced by the feature builder.
///
/// `text` and `image` are embedding vectors; `metadata` holds the raw
/// hand-crafted features. Metadata scaling happens inside the engine with the
/// scaler frozen at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFeatures {
    pub text: Vec<f32>,
    pub image: Vec<f32>,
    pub metadata: Vec<f32>,
}

impl ItemFeatures {
    pub fn new(text: Vec<f32>, image: Vec<f32>, metadata: Vec<f32>) -> Self {
        Self {
            text,
            image,
            metadata,
        }
    }

    pub fn get(&self, modality: Modality) -> &[f32] {
        match modality {
            Modality::Text => &self.text,
            Modality::Image => &self.image,
            Modality::Metadata => &self.metadata,
        }
    }

    pub fn dims(&self) -> PerModality<usize> {
        PerModality::new(self.text.len(), self.image.len(), self.metadata.len())
    }
}

/// Scores of one item in one modality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalityScore {
    /// Novelty after train-fixed min-max scaling, in `[0, 1]`.
    pub novelty: f32,
    pub diversity: f32,
    pub ds: f32,
    pub ati: f32,
}

/// Full score of one item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemScore {
    pub modalities: PerModality<ModalityScore>,
    pub ds_final: f32,
    pub ati_final: f32,
}
