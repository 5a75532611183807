//! Training and prediction benchmarks on synthetic drug records.
//!
//! Run with: `cargo bench --bench forest`

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use rxforest::data::encode_labeled;
use rxforest::testing::synthetic_records;
use rxforest::{Hyperparameters, ModelTrainer, Parallelism, Smote};

fn bench_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(5))
        .sample_size(10)
}

fn bench_training(c: &mut Criterion) {
    let records = synthetic_records(400, 0);
    let (split, schema) = encode_labeled(&records, None);
    let params = Hyperparameters::default().with_random_state(42);

    let mut group = c.benchmark_group("training/forest");
    group.throughput(Throughput::Elements(u64::from(params.n_estimators)));
    for (name, parallelism) in [("sequential", Parallelism::Sequential), ("parallel", Parallelism::Parallel)] {
        let trainer = ModelTrainer::new().with_parallelism(parallelism);
        group.bench_function(BenchmarkId::new(name, split.n_samples()), |b| {
            b.iter(|| {
                black_box(
                    trainer
                        .fit_untracked(black_box(&split), &schema, &params)
                        .unwrap(),
                )
            })
        });
    }
    group.finish();

    c.bench_function("training/smote", |b| {
        b.iter(|| black_box(Smote::default().balance(black_box(&split), 42).unwrap()))
    });
}

fn bench_prediction(c: &mut Criterion) {
    let (train, schema) = encode_labeled(&synthetic_records(400, 0), None);
    let model = ModelTrainer::new()
        .fit_untracked(&train, &schema, &Hyperparameters::default())
        .unwrap();

    let mut group = c.benchmark_group("prediction/forest");
    for n_rows in [100usize, 1_000] {
        let (batch, _) = encode_labeled(&synthetic_records(n_rows, 1), Some(&schema));
        group.throughput(Throughput::Elements(n_rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n_rows), &batch, |b, batch| {
            b.iter(|| black_box(model.predict(black_box(batch.features.view())).unwrap()))
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = bench_criterion();
    targets = bench_training, bench_prediction
}
criterion_main!(benches);
