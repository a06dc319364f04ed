//! Training pipeline: anchor fit → scoring → phase-1 → phase-2.
//!
//! Everything the pipeline learns is collected into an immutable
//! [`TrainingResult`]; nothing is mutated after the stage that produced it.
//! The three modalities share no state and are fitted in parallel.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::anchors::fit_anchors;
use crate::bounds::NoveltyBounds;
use crate::bundle::ArtifactBundle;
use crate::config::AtiConfig;
use crate::item::{ItemFeatures, ItemScore, ModalityScore};
use crate::matrix::Matrix;
use crate::modality::{Modality, PerModality};
use crate::model::ModalityModel;
use crate::report::{aggregate_by_brand, BrandAggregate, PostScoreRow};
use crate::scaler::{mean_joint_norm, MetadataScaler};
use crate::scorer::{self, RowScore};
use crate::weights::{ati_from_ds, learn_phase1, learn_phase2, CompositeWeights};
use crate::{Error, Result};

/// One post of the training split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub post_id: String,
    pub brand: String,
    pub features: ItemFeatures,
    /// Opaque regression target.
    pub target: f64,
    pub sample_weight: f64,
}

#[derive(Debug, Clone)]
pub struct TrainingResult {
    bundle: ArtifactBundle,
    scores: Vec<ItemScore>,
    rows: Vec<PostScoreRow>,
}

impl TrainingResult {
    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    pub fn into_bundle(self) -> ArtifactBundle {
        self.bundle
    }

    /// Training-time scores, in input order.
    pub fn scores(&self) -> &[ItemScore] {
        &self.scores
    }

    pub fn rows(&self) -> &[PostScoreRow] {
        &self.rows
    }

    pub fn brand_aggregates(&self) -> Vec<BrandAggregate> {
        aggregate_by_brand(&self.rows)
    }
}

/// Run the full training pipeline over `examples`.
pub fn train(config: &AtiConfig, examples: &[TrainingExample]) -> Result<TrainingResult> {
    config.validate()?;
    if examples.is_empty() {
        return Err(Error::Configuration("empty training set".to_string()));
    }
    if examples.len() < config.k {
        return Err(Error::Configuration(format!(
            "k = {} exceeds the {} training examples",
            config.k,
            examples.len()
        )));
    }
    for example in examples {
        for (modality, actual) in example.features.dims().iter() {
            let expected = *config.dims.get(modality);
            if *actual != expected {
                return Err(Error::Configuration(format!(
                    "post {}: {} vector has {} values, config expects {}",
                    example.post_id, modality, actual, expected
                )));
            }
        }
    }

    let column = |m: Modality| -> Result<Matrix> {
        let rows: Vec<Vec<f32>> = examples.iter().map(|e| e.features.get(m).to_vec()).collect();
        Matrix::from_rows(&rows)
    };
    let text = column(Modality::Text)?;
    let image = column(Modality::Image)?;
    let raw_metadata = column(Modality::Metadata)?;

    let scaler = MetadataScaler::fit(
        &raw_metadata,
        mean_joint_norm(&text, &image)?,
        config.metadata_balance_ratio as f64,
    )?;
    let metadata = scaler.transform(&raw_metadata)?;

    let target: Vec<f64> = examples.iter().map(|e| e.target).collect();
    let sample_weight: Vec<f64> = examples.iter().map(|e| e.sample_weight).collect();

    let fit = |m: Modality, vectors: &Matrix| fit_modality(config, m, vectors, &target, &sample_weight);
    let (text_fit, (image_fit, metadata_fit)) = rayon::join(
        || fit(Modality::Text, &text),
        || rayon::join(|| fit(Modality::Image, &image), || fit(Modality::Metadata, &metadata)),
    );
    let (text_model, text_scores) = text_fit?;
    let (image_model, image_scores) = image_fit?;
    let (metadata_model, metadata_scores) = metadata_fit?;

    let ds_of = |scores: &[ModalityScore]| scores.iter().map(|s| s.ds).collect::<Vec<f32>>();
    let composite = learn_phase2(
        &ds_of(&text_scores),
        &ds_of(&image_scores),
        &ds_of(&metadata_scores),
        &target,
        Some(&sample_weight),
    )?;
    info!(
        text = composite.text,
        image = composite.image,
        metadata = composite.metadata,
        "composite weights learned"
    );

    let scores: Vec<ItemScore> = (0..examples.len())
        .map(|i| {
            compose(
                &composite,
                PerModality::new(text_scores[i], image_scores[i], metadata_scores[i]),
            )
        })
        .collect();
    let rows = examples
        .iter()
        .zip(scores.iter())
        .map(|(e, s)| PostScoreRow::new(e.post_id.as_str(), e.brand.as_str(), e.target, s, false))
        .collect();

    let bundle = ArtifactBundle::new(
        config.clone(),
        PerModality::new(text_model, image_model, metadata_model),
        composite,
        scaler,
    )?;

    Ok(TrainingResult {
        bundle,
        scores,
        rows,
    })
}

/// Combine per-modality scores with the composite weights.
pub(crate) fn compose(composite: &CompositeWeights, modalities: PerModality<ModalityScore>) -> ItemScore {
    let ds_final = composite.combine(&modalities.map(|_, s| s.ds));
    ItemScore {
        modalities,
        ds_final,
        ati_final: ati_from_ds(ds_final),
    }
}

fn fit_modality(
    config: &AtiConfig,
    modality: Modality,
    vectors: &Matrix,
    target: &[f64],
    sample_weight: &[f64],
) -> Result<(ModalityModel, Vec<ModalityScore>)> {
    let anchors = fit_anchors(vectors, config.k, &config.kmeans, config.seed)?;
    let raw = scorer::score(vectors, &anchors, config.tau)?;
    let bounds = NoveltyBounds::fit(&raw.novelty_raw)?;
    let novelty = bounds.apply_all(&raw.novelty_raw);
    let weights = learn_phase1(&novelty, &raw.diversity, target, Some(sample_weight))?;

    info!(
        modality = %modality,
        k = anchors.k(),
        w_novelty = weights.novelty,
        w_diversity = weights.diversity,
        novelty_min = bounds.min,
        novelty_max = bounds.max,
        "modality fitted"
    );

    let model = ModalityModel {
        anchors,
        bounds,
        weights,
    };
    let scores = (0..vectors.rows())
        .map(|i| {
            model.finish(&RowScore {
                novelty_raw: raw.novelty_raw[i],
                diversity: raw.diversity[i],
                nearest: raw.nearest[i],
            })
        })
        .collect();
    Ok((model, scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn examples(n: usize, seed: u64) -> Vec<TrainingExample> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|i| {
                let text: Vec<f32> = (0..8).map(|_| rng.random_range(-1.0..1.0)).collect();
                let image: Vec<f32> = (0..6).map(|_| rng.random_range(-1.0..1.0)).collect();
                let metadata: Vec<f32> = (0..4).map(|_| rng.random_range(0.0..10.0)).collect();
                let target = (text[0] as f64).abs() + rng.random_range(0.0..0.1);
                TrainingExample {
                    post_id: format!("p{}", i),
                    brand: format!("b{}", i % 5),
                    features: ItemFeatures::new(text, image, metadata),
                    target,
                    sample_weight: 1.0,
                }
            })
            .collect()
    }

    fn config() -> AtiConfig {
        AtiConfig::builder().k(3).dims(8, 6, 4).build().unwrap()
    }

    #[test]
    fn test_train_produces_bounded_scores() {
        let result = train(&config(), &examples(60, 1)).unwrap();
        assert_eq!(result.scores().len(), 60);
        assert_eq!(result.rows().len(), 60);
        for s in result.scores() {
            assert!((0.0..=1.0).contains(&s.ds_final));
            assert!((0.0..=100.0).contains(&s.ati_final));
            for (_, m) in s.modalities.iter() {
                assert!((0.0..=1.0).contains(&m.novelty));
                assert!((0.0..=1.0).contains(&m.diversity));
                assert!((0.0..=1.0).contains(&m.ds));
            }
        }
        let bundle = result.bundle();
        assert!(bundle.validate().is_ok());
        for (_, model) in bundle.models().iter() {
            assert_eq!(model.anchors.k(), 3);
            assert!(model.weights.validate().is_ok());
        }
        assert_eq!(result.brand_aggregates().len(), 5);
    }

    #[test]
    fn test_train_is_deterministic() {
        let a = train(&config(), &examples(40, 7)).unwrap();
        let b = train(&config(), &examples(40, 7)).unwrap();
        assert_eq!(a.bundle(), b.bundle());
        assert_eq!(a.scores(), b.scores());
    }

    #[test]
    fn test_rejects_small_or_mismatched_sets() {
        assert!(matches!(train(&config(), &[]), Err(Error::Configuration(_))));
        assert!(matches!(train(&config(), &examples(2, 1)), Err(Error::Configuration(_))));

        let mut bad = examples(10, 1);
        bad[4].features.image.push(0.0);
        assert!(matches!(train(&config(), &bad), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_compose_scenario() {
        let m = ModalityScore {
            novelty: 0.0,
            diversity: 0.0,
            ds: 0.4,
            ati: 60.0,
        };
        let s = compose(&CompositeWeights::EQUAL, PerModality::new(m, m, m));
        assert!((s.ds_final - 0.4).abs() < 1e-6);
        assert!((s.ati_final - 60.0).abs() < 1e-4);
    }
}
