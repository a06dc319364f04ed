//! Replays training-time scoring for new items against a frozen bundle.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use rayon::prelude::*;
use tracing::info;

use crate::bundle::ArtifactBundle;
use crate::item::{ItemFeatures, ItemScore};
use crate::modality::PerModality;
use crate::training::compose;
use crate::{Error, Result};

static GLOBAL_ENGINE: OnceCell<InferenceEngine> = OnceCell::new();

/// Scores items with the anchors, bounds, weights and scaler of one bundle.
/// Nothing is refitted and no randomness is involved, so the same input
/// always yields the same output.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    bundle: Arc<ArtifactBundle>,
}

impl InferenceEngine {
    pub fn new(bundle: ArtifactBundle) -> Result<Self> {
        Self::from_shared(Arc::new(bundle))
    }

    pub fn from_shared(bundle: Arc<ArtifactBundle>) -> Result<Self> {
        bundle.validate()?;
        Ok(Self { bundle })
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// Fails with [`Error::ArtifactVersionMismatch`] when the item's vectors
    /// do not match the bundle's dimensionality.
    pub fn score_item(&self, item: &ItemFeatures) -> Result<ItemScore> {
        self.bundle.check_features(item)?;
        let tau = self.bundle.config().tau;
        let models = self.bundle.models();
        let metadata = self.bundle.scaler().transform_row(&item.metadata)?;

        let modalities = PerModality::new(
            models.text.score_vector(&item.text, tau)?,
            models.image.score_vector(&item.image, tau)?,
            models.metadata.score_vector(&metadata, tau)?,
        );
        Ok(compose(self.bundle.composite(), modalities))
    }

    /// Score many items in parallel; output order matches input order.
    pub fn score_batch(&self, items: &[ItemFeatures]) -> Result<Vec<ItemScore>> {
        items.par_iter().map(|item| self.score_item(item)).collect()
    }

    /// Reject features built with a different embedding setup.
    pub fn check_model_tag(&self, tag: &str) -> Result<()> {
        self.bundle.check_model_tag(tag)
    }

    /// Process-wide engine, loaded on first use. Later calls return the same
    /// engine and never invoke `load` again.
    pub fn global_or_init<F, E>(load: F) -> std::result::Result<&'static InferenceEngine, E>
    where
        F: FnOnce() -> std::result::Result<ArtifactBundle, E>,
        E: From<Error>,
    {
        GLOBAL_ENGINE.get_or_try_init(|| {
            let engine = InferenceEngine::new(load()?)?;
            info!(
                k = engine.bundle.config().k,
                embedding_model = %engine.bundle.config().embedding_model,
                "global inference engine loaded"
            );
            Ok(engine)
        })
    }

    pub fn global() -> Option<&'static InferenceEngine> {
        GLOBAL_ENGINE.get()
    }
}
