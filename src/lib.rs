//! # ATI
//!
//! Authenticity/Trend Index: scores how distinctive a social-media post is
//! relative to a brand corpus, across text, image and metadata.
//!
//! Lower ATI means more novel and diverse content; higher ATI means content
//! that sits close to what the corpus already contains.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ati::prelude::*;
//!
//! # fn examples() -> Vec<TrainingExample> { Vec::new() }
//! # fn main() -> anyhow::Result<()> {
//! let config = AtiConfig::builder().k(6).tau(0.07).dims(1024, 512, 21).build()?;
//! let result = train(&config, &examples())?;
//!
//! let store = ArtifactStore::open("artifacts")?;
//! store.publish(result.bundle())?;
//!
//! let engine = InferenceEngine::global_or_init(|| store.load_current())?;
//! let score = engine.score_item(&ItemFeatures::new(vec![0.0; 1024], vec![0.0; 512], vec![0.0; 21]))?;
//! println!("ATI = {:.1}", score.ati_final);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - `ati-core` - anchors, scoring, weight learning, training, inference
//! - `ati-features` - embedder traits, metadata features, target, embedding cache
//! - `ati-storage` - versioned artifact store

pub use ati_core::{
    aggregate_by_brand, ati_from_ds, fit_anchors, learn_phase1, learn_phase2, train, Anchors,
    ArtifactBundle, AtiConfig, AtiConfigBuilder, BrandAggregate, CompositeWeights, Error,
    Fallback, FallbackCounters, FallbackSnapshot, InferenceEngine, ItemFeatures, ItemScore,
    KMeansParams, Matrix, Modality, ModalityDims, ModalityModel, ModalityScore, ModalityWeights,
    NoveltyBounds, PerModality, PostScoreRow, Result, TrainingExample, TrainingResult,
};

pub use ati_features::{
    brand_sample_weights, engagement_target, late_entry_brands, CachedImageEmbedder,
    CachedTextEmbedder, ContentCache, ContentKey, FeatureBuilder, FeatureError, FsContentCache,
    ImageEmbedder, KeywordLexicon, MemoryContentCache, MetadataExtractor, PostContent,
    TextEmbedder, METADATA_DIM,
};

pub use ati_storage::{ArtifactStore, BundleManifest, StoreError};

pub mod evaluation {
    pub use ati_core::evaluation::*;
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        train, ArtifactBundle, ArtifactStore, AtiConfig, Error, FeatureBuilder, InferenceEngine,
        ItemFeatures, ItemScore, Modality, PerModality, PostContent, PostScoreRow, Result,
        TrainingExample, TrainingResult,
    };
}
