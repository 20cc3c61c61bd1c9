#![allow(dead_code)]

use std::path::{Path, PathBuf};

use polars::prelude::*;
use predictive_maintenance::config::PipelineSettings;
use predictive_maintenance::source::{frame_to_documents, DocumentSink, FileDocumentStore};
use predictive_maintenance::training::{ModelFamily, ModelRegistry, ParamGrid};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

pub const DATABASE: &str = "plant";
pub const COLLECTION: &str = "machines";

pub fn schema_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data_schema/schema.yaml")
}

/// Machine readings where high torque on a worn tool means failure
pub fn machine_readings(n: usize, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let types = ["L", "M", "H"];

    let mut udi = Vec::with_capacity(n);
    let mut product = Vec::with_capacity(n);
    let mut kind = Vec::with_capacity(n);
    let mut air = Vec::with_capacity(n);
    let mut process = Vec::with_capacity(n);
    let mut speed = Vec::with_capacity(n);
    let mut torque = Vec::with_capacity(n);
    let mut wear = Vec::with_capacity(n);
    let mut target = Vec::with_capacity(n);
    let mut failure = Vec::with_capacity(n);

    for i in 0..n {
        let t = types[i % 3];
        let tq: f64 = rng.gen_range(20.0..70.0);
        let tw: i64 = rng.gen_range(0..250);
        let air_k: f64 = rng.gen_range(296.0..304.0);
        let failed = tq > 52.0 && tw > 120;

        udi.push(i as i64 + 1);
        product.push(format!("{}{}", t, 10000 + i));
        kind.push(t.to_string());
        air.push(air_k);
        process.push(air_k + rng.gen_range(9.0..11.0));
        speed.push(rng.gen_range(1200..2800) as i64);
        torque.push(tq);
        wear.push(tw);
        target.push(failed as i64);
        failure.push(if failed { "Overstrain Failure" } else { "No Failure" }.to_string());
    }

    df! {
        "UDI" => udi,
        "Product ID" => product,
        "Type" => kind,
        "Air temperature [K]" => air,
        "Process temperature [K]" => process,
        "Rotational speed [rpm]" => speed,
        "Torque [Nm]" => torque,
        "Tool wear [min]" => wear,
        "Target" => target,
        "Failure Type" => failure,
    }
    .unwrap()
}

/// Settings with every directory under `root` and a seeded document store
pub fn seeded_settings(root: &Path, rows: usize) -> PipelineSettings {
    let settings = PipelineSettings::default()
        .rooted_at(root)
        .with_schema_path(schema_path())
        .with_document_store_root(root.join("store"))
        .with_collection(DATABASE, COLLECTION)
        .with_cv_folds(3);

    let documents = frame_to_documents(&machine_readings(rows, 11)).unwrap();
    FileDocumentStore::new(&settings.document_store_root)
        .insert_many(DATABASE, COLLECTION, documents)
        .unwrap();
    settings
}

/// A roster small enough for tests
pub fn quick_registry() -> ModelRegistry {
    ModelRegistry::new()
        .with_model(ModelFamily::DecisionTree, ModelFamily::DecisionTree.default_grid())
        .with_model(ModelFamily::RandomForest, ParamGrid::new().with_param("n_estimators", [8i64]))
        .with_model(ModelFamily::LogisticRegression, ParamGrid::new())
}
