//! # ATI Core
//!
//! Distinctiveness scoring engine behind the Authenticity/Trend Index.
//!
//! - [`fit_anchors`] - mini-batch k-means anchors per modality
//! - [`scorer`] - novelty (1 − max cosine) and diversity (normalized softmax entropy)
//! - [`NoveltyBounds`] - train-fixed min-max scaling of novelty
//! - [`learn_phase1`] / [`learn_phase2`] - clipped, renormalized OLS weights
//! - [`train`] - full pipeline producing a [`TrainingResult`] and its [`ArtifactBundle`]
//! - [`InferenceEngine`] - replays the training formula against a frozen bundle
//!
//! ## Example
//!
//! ```rust,no_run
//! use ati_core::{train, AtiConfig, InferenceEngine, ItemFeatures, TrainingExample};
//!
//! # fn examples() -> Vec<TrainingExample> { Vec::new() }
//! let config = AtiConfig::builder().k(6).dims(1024, 512, 21).build().unwrap();
//! let result = train(&config, &examples()).unwrap();
//!
//! let engine = InferenceEngine::new(result.into_bundle()).unwrap();
//! let score = engine
//!     .score_item(&ItemFeatures::new(vec![0.0; 1024], vec![0.0; 512], vec![0.0; 21]))
//!     .unwrap();
//! println!("ATI = {:.1}", score.ati_final);
//! ```

pub mod anchors;
pub mod bounds;
pub mod bundle;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod fallback;
pub mod inference;
pub mod item;
pub mod matrix;
pub mod modality;
pub mod model;
pub mod regression;
pub mod report;
pub mod scaler;
pub mod scorer;
pub mod training;
pub mod vector;
pub mod weights;

pub use anchors::{fit_anchors, Anchors};
pub use bounds::NoveltyBounds;
pub use bundle::ArtifactBundle;
pub use config::{AtiConfig, AtiConfigBuilder, KMeansParams, ModalityDims};
pub use error::{Error, Result};
pub use fallback::{Fallback, FallbackCounters, FallbackSnapshot};
pub use inference::InferenceEngine;
pub use item::{ItemFeatures, ItemScore, ModalityScore};
pub use matrix::Matrix;
pub use modality::{Modality, PerModality};
pub use model::ModalityModel;
pub use report::{aggregate_by_brand, BrandAggregate, PostScoreRow};
pub use scaler::MetadataScaler;
pub use training::{train, TrainingExample, TrainingResult};
pub use weights::{ati_from_ds, learn_phase1, learn_phase2, CompositeWeights, ModalityWeights};
