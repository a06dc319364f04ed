//! # ATI Features
//!
//! The boundary between raw posts and the scoring engine: embedder traits,
//! hand-crafted metadata features, the engagement target with per-brand
//! sample weights, and a content-addressed embedding cache.

pub mod builder;
pub mod cache;
pub mod error;
pub mod metadata;
pub mod target;

pub use builder::{FeatureBuilder, ImageEmbedder, PostContent, TextEmbedder};
pub use cache::{
    CachedImageEmbedder, CachedTextEmbedder, ContentCache, ContentKey, FsContentCache,
    MemoryContentCache,
};
pub use error::{FeatureError, Result};
pub use metadata::{KeywordLexicon, MetadataExtractor, METADATA_DIM, METADATA_FEATURE_NAMES};
pub use target::{brand_sample_weights, engagement_target, late_entry_brands};
