//! Typed engine configuration.
//!
//! Everything that changes a score lives here and is recorded in the
//! artifact bundle, so inference can refuse inputs produced under a
//! different setup.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::modality::PerModality;
use crate::{Error, Result};

pub const DEFAULT_K: usize = 6;
pub const DEFAULT_TAU: f32 = 0.07;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_EMBEDDING_MODEL: &str = "chinese-clip-vit-base-patch16";

/// Expected vector length per modality. Metadata counts raw hand-crafted features.
pub type ModalityDims = PerModality<usize>;

impl ModalityDims {
    /// Caption ⊕ OCR embeddings (2 × 512), one pooled image embedding, 21 metadata features.
    pub fn reference() -> Self {
        PerModality::new(1024, 512, 21)
    }
}

/// Mini-batch k-means parameters for the anchor fitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KMeansParams {
    pub batch_size: usize,
    pub max_iter: usize,
    /// Stop once the summed squared centroid shift of an iteration drops below this.
    pub tolerance: f32,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            batch_size: 512,
            max_iter: 100,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtiConfig {
    /// Anchors per modality.
    pub k: usize,
    /// Softmax temperature for diversity.
    pub tau: f32,
    pub seed: u64,
    pub dims: ModalityDims,
    /// Version tag of the embedding/feature-extraction setup.
    pub embedding_model: String,
    pub kmeans: KMeansParams,
    /// Target ratio of mean metadata norm to mean semantic (text ⊕ image) norm.
    pub metadata_balance_ratio: f32,
}

impl Default for AtiConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            tau: DEFAULT_TAU,
            seed: DEFAULT_SEED,
            dims: ModalityDims::reference(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            kmeans: KMeansParams::default(),
            metadata_balance_ratio: 0.5,
        }
    }
}

impl AtiConfig {
    pub fn builder() -> AtiConfigBuilder {
        AtiConfigBuilder {
            config: AtiConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.k < 2 {
            return Err(Error::Configuration(format!("k must be >= 2, got {}", self.k)));
        }
        if !self.tau.is_finite() || self.tau <= 0.0 {
            return Err(Error::Configuration(format!(
                "tau must be a positive finite number, got {}",
                self.tau
            )));
        }
        for (modality, dim) in self.dims.iter() {
            if *dim == 0 {
                return Err(Error::Configuration(format!(
                    "{} dimensionality must be >= 1",
                    modality
                )));
            }
        }
        if self.embedding_model.trim().is_empty() {
            return Err(Error::Configuration(
                "embedding_model version tag must not be empty".to_string(),
            ));
        }
        if self.kmeans.batch_size == 0 || self.kmeans.max_iter == 0 {
            return Err(Error::Configuration(
                "kmeans batch_size and max_iter must be >= 1".to_string(),
            ));
        }
        if !self.kmeans.tolerance.is_finite() || self.kmeans.tolerance < 0.0 {
            return Err(Error::Configuration(format!(
                "kmeans tolerance must be >= 0, got {}",
                self.kmeans.tolerance
            )));
        }
        if !self.metadata_balance_ratio.is_finite() || self.metadata_balance_ratio <= 0.0 {
            return Err(Error::Configuration(format!(
                "metadata_balance_ratio must be > 0, got {}",
                self.metadata_balance_ratio
            )));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AtiConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }
}

/// Builder that only hands out validated configurations.
#[derive(Debug, Clone)]
pub struct AtiConfigBuilder {
    config: AtiConfig,
}

impl AtiConfigBuilder {
    pub fn k(mut self, k: usize) -> Self {
        self.config.k = k;
        self
    }

    pub fn tau(mut self, tau: f32) -> Self {
        self.config.tau = tau;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn dims(mut self, text: usize, image: usize, metadata: usize) -> Self {
        self.config.dims = PerModality::new(text, image, metadata);
        self
    }

    pub fn embedding_model(mut self, tag: impl Into<String>) -> Self {
        self.config.embedding_model = tag.into();
        self
    }

    pub fn kmeans(mut self, params: KMeansParams) -> Self {
        self.config.kmeans = params;
        self
    }

    pub fn metadata_balance_ratio(mut self, ratio: f32) -> Self {
        self.config.metadata_balance_ratio = ratio;
        self
    }

    pub fn build(self) -> Result<AtiConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = AtiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.k, 6);
        assert!((config.tau - 0.07).abs() < 1e-9);
    }

    #[test]
    fn test_builder_rejects_bad_ranges() {
        assert!(AtiConfig::builder().k(1).build().is_err());
        assert!(AtiConfig::builder().tau(0.0).build().is_err());
        assert!(AtiConfig::builder().tau(f32::NAN).build().is_err());
        assert!(AtiConfig::builder().dims(0, 4, 4).build().is_err());
        assert!(AtiConfig::builder().embedding_model("  ").build().is_err());
        assert!(AtiConfig::builder().metadata_balance_ratio(-1.0).build().is_err());
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let config = AtiConfig::from_json_str(r#"{"k": 4, "dims": {"text": 8, "image": 4, "metadata": 3}}"#)
            .unwrap();
        assert_eq!(config.k, 4);
        assert_eq!(config.dims.image, 4);
        assert_eq!(config.seed, DEFAULT_SEED);
    }

    #[test]
    fn test_json_validates() {
        let err = AtiConfig::from_json_str(r#"{"k": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ati.json");
        std::fs::write(&path, r#"{"tau": 1.0, "embedding_model": "openai-clip"}"#).unwrap();
        let config = AtiConfig::from_json_file(&path).unwrap();
        assert_eq!(config.embedding_model, "openai-clip");
        assert_eq!(config.tau, 1.0);
    }
}
