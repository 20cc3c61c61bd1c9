use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use predictive_maintenance::training::{GridSearchCV, ModelFamily, ParamGrid, RandomForestClassifier};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>());
    let y = x
        .rows()
        .into_iter()
        .map(|row| if row.sum() > n_features as f64 / 2.0 { 1.0 } else { 0.0 })
        .collect();
    (x, y)
}

fn bench_forest_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_forest");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [500, 2000, 5000].iter() {
        let (x, y) = create_classification_data(*n_rows, 6);

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let mut model = RandomForestClassifier::new().with_n_estimators(32);
                model.fit(black_box(x), black_box(y)).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    let (x, y) = create_classification_data(1000, 6);
    let grids = [
        (ModelFamily::DecisionTree, ModelFamily::DecisionTree.default_grid()),
        (
            ModelFamily::AdaBoost,
            ParamGrid::new()
                .with_param("learning_rate", [0.1, 0.01])
                .with_param("n_estimators", [8i64, 32]),
        ),
    ];

    for (family, grid) in grids.iter() {
        group.bench_function(BenchmarkId::new("fit", family.name()), |b| {
            b.iter(|| {
                GridSearchCV::new(5)
                    .unwrap()
                    .fit(|params| family.build(params, 42), black_box(grid), &x, &y)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train model once
    let (x_train, y_train) = create_classification_data(2000, 6);
    let mut model = RandomForestClassifier::new().with_n_estimators(64);
    model.fit(&x_train, &y_train).unwrap();

    for n_rows in [100, 1000, 10000].iter() {
        let (x, _) = create_classification_data(*n_rows, 6);

        group.bench_with_input(BenchmarkId::new("predict", n_rows), &x, |b, x| {
            b.iter(|| model.predict(black_box(x)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_forest_fit, bench_grid_search, bench_prediction);
criterion_main!(benches);
