//! The frozen artifact set that lets inference replay training-time scoring.

use serde::{Deserialize, Serialize};

use crate::config::AtiConfig;
use crate::item::ItemFeatures;
use crate::modality::PerModality;
use crate::model::ModalityModel;
use crate::scaler::MetadataScaler;
use crate::weights::CompositeWeights;
use crate::{Error, Result};

/// Anchors, bounds and weights of every modality, the composite weights, the
/// metadata scaler and the config they were trained with.
///
/// Created once at the end of training and read-only afterwards. Fields are
/// private so a bundle can only be built through [`ArtifactBundle::new`] or
/// deserialization followed by [`ArtifactBundle::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    format_version: u32,
    config: AtiConfig,
    models: PerModality<ModalityModel>,
    composite: CompositeWeights,
    scaler: MetadataScaler,
}

impl ArtifactBundle {
    /// Bumped whenever the serialized layout changes.
    pub const FORMAT_VERSION: u32 = 1;

    pub fn new(
        config: AtiConfig,
        models: PerModality<ModalityModel>,
        composite: CompositeWeights,
        scaler: MetadataScaler,
    ) -> Result<Self> {
        let bundle = Self {
            format_version: Self::FORMAT_VERSION,
            config,
            models,
            composite,
            scaler,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn config(&self) -> &AtiConfig {
        &self.config
    }

    pub fn models(&self) -> &PerModality<ModalityModel> {
        &self.models
    }

    pub fn composite(&self) -> &CompositeWeights {
        &self.composite
    }

    pub fn scaler(&self) -> &MetadataScaler {
        &self.scaler
    }

    /// Check internal consistency. Any drift between the recorded config and
    /// the stored parameters is an [`Error::ArtifactVersionMismatch`].
    pub fn validate(&self) -> Result<()> {
        if self.format_version != Self::FORMAT_VERSION {
            return Err(Error::mismatch(
                "bundle format version",
                Self::FORMAT_VERSION,
                self.format_version,
            ));
        }
        self.config.validate()?;

        for (modality, model) in self.models.iter() {
            if model.anchors.k() != self.config.k {
                return Err(Error::mismatch(
                    format!("{} anchor count", modality),
                    self.config.k,
                    model.anchors.k(),
                ));
            }
            let dim = *self.config.dims.get(modality);
            if model.anchors.dim() != dim {
                return Err(Error::mismatch(
                    format!("{} anchor dimensionality", modality),
                    dim,
                    model.anchors.dim(),
                ));
            }
            model.bounds.validate()?;
            model.weights.validate()?;
        }
        self.composite.validate()?;

        self.scaler.validate()?;
        if self.scaler.dim() != self.config.dims.metadata {
            return Err(Error::mismatch(
                "metadata scaler width",
                self.config.dims.metadata,
                self.scaler.dim(),
            ));
        }
        Ok(())
    }

    /// Reject feature vectors whose shape differs from what the bundle was
    /// trained on.
    pub fn check_features(&self, item: &ItemFeatures) -> Result<()> {
        for (modality, actual) in item.dims().iter() {
            let expected = *self.config.dims.get(modality);
            if *actual != expected {
                return Err(Error::mismatch(
                    format!("{} dimensionality", modality),
                    expected,
                    actual,
                ));
            }
        }
        Ok(())
    }

    /// Reject features produced by a different embedding setup.
    pub fn check_model_tag(&self, tag: &str) -> Result<()> {
        if tag != self.config.embedding_model {
            return Err(Error::mismatch(
                "embedding model",
                &self.config.embedding_model,
                tag,
            ));
        }
        Ok(())
    }
}
