//! Assembles the three modality vectors of a post.
//!
//! Embedding models are black boxes behind [`TextEmbedder`] and
//! [`ImageEmbedder`]. The builder concatenates the unit-normalized caption
//! and OCR embeddings into the text vector, mean-pools image embeddings into the image vector
//! and extracts the raw metadata row.

use ati_core::vector::{l2_normalize, mean_pooled};
use ati_core::{ArtifactBundle, ItemFeatures, ModalityDims};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FeatureError, Result};
use crate::metadata::{MetadataExtractor, METADATA_DIM};

/// Substituted for empty text so the embedder always sees input.
pub const EMPTY_TEXT_PLACEHOLDER: &str = "。";
/// Characters of text handed to the text embedder.
pub const MAX_TEXT_CHARS: usize = 512;
pub const DEFAULT_MAX_IMAGES: usize = 1;

pub trait TextEmbedder: Send + Sync {
    /// Version tag of the model; part of every cache key and checked
    /// against the bundle at inference.
    fn model_tag(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

pub trait ImageEmbedder: Send + Sync {
    fn model_tag(&self) -> &str;
    fn dim(&self) -> usize;
    /// Embed one encoded image.
    fn embed(&self, image: &[u8]) -> Result<Vec<f32>>;
}

/// Raw inputs of one post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostContent {
    pub caption: String,
    /// Text recognized in the post's images.
    pub ocr_text: String,
    /// `%Y-%m-%d %H:%M:%S`
    pub timestamp: Option<String>,
    /// Encoded images in post order.
    pub images: Vec<Vec<u8>>,
}

pub struct FeatureBuilder<T, I> {
    text: T,
    image: I,
    metadata: MetadataExtractor,
    max_images: usize,
}

impl<T: TextEmbedder, I: ImageEmbedder> FeatureBuilder<T, I> {
    pub fn new(text: T, image: I) -> Self {
        Self {
            text,
            image,
            metadata: MetadataExtractor::default(),
            max_images: DEFAULT_MAX_IMAGES,
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataExtractor) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images.max(1);
        self
    }

    /// Combined version tag of both embedders.
    pub fn model_tag(&self) -> String {
        let (t, i) = (self.text.model_tag(), self.image.model_tag());
        if t == i {
            t.to_string()
        } else {
            format!("{}+{}", t, i)
        }
    }

    pub fn dims(&self) -> ModalityDims {
        ModalityDims::new(2 * self.text.dim(), self.image.dim(), METADATA_DIM)
    }

    /// Confirm this builder produces what `bundle` was trained on.
    pub fn check_bundle(&self, bundle: &ArtifactBundle) -> ati_core::Result<()> {
        bundle.check_model_tag(&self.model_tag())?;
        let expected = bundle.config().dims;
        for (modality, dim) in self.dims().iter() {
            let want = *expected.get(modality);
            if *dim != want {
                return Err(ati_core::Error::mismatch(
                    format!("{} dimensionality", modality),
                    want,
                    dim,
                ));
            }
        }
        Ok(())
    }

    pub fn build(&self, post: &PostContent) -> Result<ItemFeatures> {
        let mut text = self.embed_text(&post.caption)?;
        text.extend(self.embed_text(&post.ocr_text)?);

        let image = self.embed_images(&post.images)?;
        let metadata =
            self.metadata
                .extract(&post.caption, &post.ocr_text, post.timestamp.as_deref());

        Ok(ItemFeatures::new(text, image, metadata))
    }

    pub fn build_all(&self, posts: &[PostContent]) -> Result<Vec<ItemFeatures>> {
        posts.iter().map(|p| self.build(p)).collect()
    }

    fn embed_text(&self, raw: &str) -> Result<Vec<f32>> {
        let text: String = if raw.trim().is_empty() {
            EMPTY_TEXT_PLACEHOLDER.to_string()
        } else {
            raw.chars().take(MAX_TEXT_CHARS).collect()
        };
        let mut v = self.text.embed(&text)?;
        check_dim(self.text.model_tag(), self.text.dim(), &v)?;
        l2_normalize(&mut v);
        Ok(v)
    }

    /// Unreadable images are skipped; a post without usable images gets the
    /// zero vector.
    fn embed_images(&self, images: &[Vec<u8>]) -> Result<Vec<f32>> {
        let mut vectors = Vec::new();
        for (i, bytes) in images.iter().take(self.max_images).enumerate() {
            match self.image.embed(bytes) {
                Ok(v) => {
                    check_dim(self.image.model_tag(), self.image.dim(), &v)?;
                    vectors.push(v);
                }
                Err(e) => warn!(index = i, error = %e, "skipping image that failed to embed"),
            }
        }
        Ok(mean_pooled(&vectors, self.max_images).unwrap_or_else(|| vec![0.0; self.image.dim()]))
    }
}

fn check_dim(model: &str, expected: usize, v: &[f32]) -> Result<()> {
    if v.len() != expected {
        return Err(FeatureError::EmbeddingDimension {
            model: model.to_string(),
            expected,
            actual: v.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ati_core::{AtiConfig, CompositeWeights, MetadataScaler, ModalityModel, PerModality};
    use ati_core::{Anchors, ModalityWeights, NoveltyBounds};
    use parking_lot::Mutex;

    struct FakeText {
        seen: Mutex<Vec<String>>,
    }

    impl TextEmbedder for FakeText {
        fn model_tag(&self) -> &str {
            "clip-test"
        }
        fn dim(&self) -> usize {
            2
        }
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.seen.lock().push(text.to_string());
            Ok(vec![text.chars().count() as f32, 1.0])
        }
    }

    struct FakeImage;

    impl ImageEmbedder for FakeImage {
        fn model_tag(&self) -> &str {
            "clip-test"
        }
        fn dim(&self) -> usize {
            2
        }
        fn embed(&self, image: &[u8]) -> Result<Vec<f32>> {
            if image.is_empty() {
                return Err(FeatureError::Embedder {
                    model: "clip-test".to_string(),
                    message: "empty image".to_string(),
                });
            }
            Ok(vec![image[0] as f32, 0.0])
        }
    }

    fn builder() -> FeatureBuilder<FakeText, FakeImage> {
        FeatureBuilder::new(
            FakeText {
                seen: Mutex::new(Vec::new()),
            },
            FakeImage,
        )
    }

    #[test]
    fn test_build_concatenates_text_and_pools_images() {
        let b = builder().with_max_images(2);
        let post = PostContent {
            caption: "abc".to_string(),
            ocr_text: String::new(),
            timestamp: Some("2025-05-01 12:00:00".to_string()),
            images: vec![vec![3], vec![], vec![9]],
        };
        let f = b.build(&post).unwrap();
        let expected = [
            3.0 / 10f32.sqrt(),
            1.0 / 10f32.sqrt(),
            std::f32::consts::FRAC_1_SQRT_2,
            std::f32::consts::FRAC_1_SQRT_2,
        ];
        for (got, want) in f.text.iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "{} vs {}", got, want);
        }
        // Second image fails and third is past the limit: mean of [3, 0] only.
        assert!((f.image[0] - 1.0).abs() < 1e-6);
        assert_eq!(f.metadata.len(), METADATA_DIM);
        assert_eq!(b.text.seen.lock()[1], EMPTY_TEXT_PLACEHOLDER);
    }

    #[test]
    fn test_text_halves_are_unit_norm() {
        let posts = vec![
            PostContent {
                caption: "a much longer caption".to_string(),
                ocr_text: "SALE".to_string(),
                ..Default::default()
            },
            PostContent::default(),
        ];
        let features = builder().build_all(&posts).unwrap();
        assert_eq!(features.len(), 2);
        for f in &features {
            let (caption, ocr) = f.text.split_at(2);
            assert!((ati_core::vector::norm(caption) - 1.0).abs() < 1e-5);
            assert!((ati_core::vector::norm(ocr) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_no_images_gives_zero_vector() {
        let f = builder().build(&PostContent::default()).unwrap();
        assert_eq!(f.image, vec![0.0, 0.0]);
    }

    #[test]
    fn test_check_bundle_rejects_other_model() {
        let b = builder();
        let model = |dim: usize| ModalityModel {
            anchors: Anchors::from_rows(&[
                (0..dim).map(|j| if j == 0 { 1.0 } else { 0.0 }).collect(),
                (0..dim).map(|j| if j == 1 { 1.0 } else { 0.0 }).collect(),
            ])
            .unwrap(),
            bounds: NoveltyBounds { min: 0.0, max: 1.0 },
            weights: ModalityWeights::EQUAL,
        };
        let scaler = MetadataScaler {
            mean: vec![0.0; METADATA_DIM],
            scale: vec![1.0; METADATA_DIM],
            balance: 1.0,
        };
        let make = |tag: &str| {
            let config = AtiConfig::builder()
                .k(2)
                .dims(4, 2, METADATA_DIM)
                .embedding_model(tag)
                .build()
                .unwrap();
            ArtifactBundle::new(
                config,
                PerModality::new(model(4), model(2), model(METADATA_DIM)),
                CompositeWeights::EQUAL,
                scaler.clone(),
            )
            .unwrap()
        };
        assert!(b.check_bundle(&make("clip-test")).is_ok());
        assert!(b.check_bundle(&make("other")).unwrap_err().is_version_mismatch());
    }
}
