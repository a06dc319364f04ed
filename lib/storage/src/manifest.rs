use ati_core::{ArtifactBundle, ModalityDims};
use serde::{Deserialize, Serialize};

/// Human-readable summary of the config a bundle was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub k: usize,
    pub tau: f32,
    pub seed: u64,
    pub dims: ModalityDims,
    pub embedding_model: String,
}

impl ConfigSummary {
    pub fn of(bundle: &ArtifactBundle) -> Self {
        let c = bundle.config();
        Self {
            k: c.k,
            tau: c.tau,
            seed: c.seed,
            dims: c.dims,
            embedding_model: c.embedding_model.clone(),
        }
    }
}

/// `manifest.json` next to every published bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub version: String,
    pub bundle_id: String,
    /// RFC 3339.
    pub created_at: String,
    /// SHA-256 of `bundle.bin.gz`, lowercase hex.
    pub sha256: String,
    pub size: u64,
    pub format_version: u32,
    pub config: ConfigSummary,
}
