use bank_mlops::config::ModelParams;
use bank_mlops::training::ClassifierModel;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Thirty standardised features, label driven by the first three
fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 2.0 - 1.0);
    let y = x
        .rows()
        .into_iter()
        .map(|row| {
            let score = row[0] * 1.5 - row[1] + 0.5 * row[2] + (rng.gen::<f64>() - 0.5) * 0.3;
            if score > 0.0 { 1.0 } else { 0.0 }
        })
        .collect();
    (x, y)
}

fn bench_params() -> ModelParams {
    let mut params = ModelParams::default();
    params.random_forest.n_estimators = 50;
    params.gradient_boosting.n_estimators = 50;
    params
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [1000, 5000].iter() {
        let (x, y) = create_classification_data(*n_rows, 30);

        for template in ClassifierModel::candidates(&bench_params()) {
            group.bench_with_input(BenchmarkId::new(template.name(), n_rows), n_rows, |b, _| {
                b.iter(|| {
                    let mut model = template.clone();
                    model.fit(black_box(&x), black_box(&y)).unwrap();
                    model
                });
            });
        }
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");
    let (x, y) = create_classification_data(5000, 30);
    let (batch, _) = create_classification_data(1000, 30);

    for mut model in ClassifierModel::candidates(&bench_params()) {
        model.fit(&x, &y).unwrap();
        group.bench_function(BenchmarkId::new("predict_proba", model.name()), |b| {
            b.iter(|| model.predict_proba(black_box(&batch)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction);
criterion_main!(benches);
