// Training and inference benchmarks at the reference dimensionality
use ati::{train, AtiConfig, InferenceEngine, ItemFeatures, TrainingExample};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand::rngs::StdRng;

const TEXT_DIM: usize = 1024;
const IMAGE_DIM: usize = 512;
const META_DIM: usize = 21;

fn random_vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.random_range(-1.0f32..1.0f32)).collect()
}

fn random_item(rng: &mut StdRng) -> ItemFeatures {
    ItemFeatures::new(
        random_vector(rng, TEXT_DIM),
        random_vector(rng, IMAGE_DIM),
        (0..META_DIM).map(|_| rng.random_range(0.0f32..50.0)).collect(),
    )
}

fn training_set(n: usize) -> Vec<TrainingExample> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|i| {
            let features = random_item(&mut rng);
            TrainingExample {
                post_id: i.to_string(),
                brand: format!("brand-{}", i % 20),
                target: features.text[0].abs() as f64,
                features,
                sample_weight: 1.0,
            }
        })
        .collect()
}

fn config() -> AtiConfig {
    AtiConfig::builder()
        .dims(TEXT_DIM, IMAGE_DIM, META_DIM)
        .build()
        .unwrap()
}

fn benchmark_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");
    group.sample_size(10);

    for size in [500, 2000].iter() {
        let examples = training_set(*size);
        group.bench_with_input(BenchmarkId::new("full_pipeline", size), size, |b, _| {
            b.iter(|| black_box(train(&config(), &examples).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference");

    let engine = InferenceEngine::new(train(&config(), &training_set(1000)).unwrap().into_bundle()).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let item = random_item(&mut rng);
    let batch: Vec<ItemFeatures> = (0..1000).map(|_| random_item(&mut rng)).collect();

    group.bench_function("score_item", |b| {
        b.iter(|| black_box(engine.score_item(black_box(&item)).unwrap()));
    });

    group.bench_function("score_batch_1000", |b| {
        b.iter(|| black_box(engine.score_batch(black_box(&batch)).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, benchmark_train, benchmark_inference);
criterion_main!(benches);
