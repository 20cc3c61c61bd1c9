//! Data transformation stage
//!
//! Engineers features, fits the preprocessor on train only, rebalances the
//! classes and persists label-last arrays for training.

use ndarray::{concatenate, s, Array1, Array2, Axis};
use polars::prelude::*;
use tracing::info;

use crate::artifact::{DataTransformationArtifact, DataValidationArtifact};
use crate::config::DataTransformationConfig;
use crate::error::{MaintenanceError, Result};
use crate::preprocessing::{build_preprocessor, engineer_features};
use crate::schema::SchemaConfig;
use crate::synthetic::{class_counts, Sampler, SmoteEnn};
use crate::utils::{label_vector, save_array, DataLoader};

/// Split a table into its input features and the integer target label
pub fn split_features_target(df: &DataFrame, target: &str) -> Result<(DataFrame, Array1<i64>)> {
    let labels = label_vector(df, target)?;
    Ok((df.drop(target)?, labels))
}

/// Append the label as the last column
pub fn append_label(x: &Array2<f64>, y: &Array1<i64>) -> Result<Array2<f64>> {
    if x.nrows() != y.len() {
        return Err(MaintenanceError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    let label = y.mapv(|v| v as f64).insert_axis(Axis(1));
    Ok(concatenate(Axis(1), &[x.view(), label.view()])?)
}

/// Inverse of [`append_label`]
pub fn split_label(arr: &Array2<f64>) -> Result<(Array2<f64>, Array1<i64>)> {
    if arr.ncols() < 2 {
        return Err(MaintenanceError::ShapeError {
            expected: "at least one feature column and a label column".to_string(),
            actual: format!("{} columns", arr.ncols()),
        });
    }
    let last = arr.ncols() - 1;
    let x = arr.slice(s![.., ..last]).to_owned();
    let y = arr.column(last).mapv(|v| v.round() as i64);
    Ok((x, y))
}

pub struct DataTransformation {
    validation_artifact: DataValidationArtifact,
    config: DataTransformationConfig,
    schema: SchemaConfig,
}

impl DataTransformation {
    pub fn new(
        validation_artifact: DataValidationArtifact,
        config: DataTransformationConfig,
        schema: SchemaConfig,
    ) -> Self {
        Self {
            validation_artifact,
            config,
            schema,
        }
    }

    fn rebalance(&self, x: &Array2<f64>, y: &Array1<i64>, split: &str) -> Result<(Array2<f64>, Array1<i64>)> {
        if x.iter().any(|v| v.is_nan()) {
            return Err(MaintenanceError::TransformationError(format!(
                "{} features contain missing values after preprocessing",
                split
            )));
        }
        let mut sampler = SmoteEnn::new(&self.config.resampling, self.config.random_seed);
        let result = sampler.fit_resample(x, y)?;
        info!(
            split,
            before = ?class_counts(y),
            after = ?class_counts(&result.y),
            "Applied SMOTE-ENN"
        );
        Ok((result.x, result.y))
    }

    pub fn initiate_data_transformation(&self) -> Result<DataTransformationArtifact> {
        info!("Starting data transformation");
        let loader = DataLoader::new();
        let train_df = loader.load_csv(&self.validation_artifact.valid_train_file_path)?;
        let test_df = loader.load_csv(&self.validation_artifact.valid_test_file_path)?;

        let target = self.schema.target_column.as_str();
        let (train_features, train_target) = split_features_target(&train_df, target)?;
        let (test_features, test_target) = split_features_target(&test_df, target)?;
        let train_features = engineer_features(&train_features, &self.schema)?;
        let test_features = engineer_features(&test_features, &self.schema)?;
        info!(columns = ?train_features.get_column_names_str(), "Engineered features");

        let mut preprocessor = build_preprocessor(&self.schema)?;
        let train_x = preprocessor.fit_transform(&train_features)?;
        let test_x = preprocessor.transform(&test_features)?;

        let (train_x, train_y) = self.rebalance(&train_x, &train_target, "train")?;
        // The test split is rebalanced too unless disabled, so its metrics describe resampled data
        let (test_x, test_y) = if self.config.resampling.apply_to_test {
            self.rebalance(&test_x, &test_target, "test")?
        } else {
            (test_x, test_target)
        };

        let train_arr = append_label(&train_x, &train_y)?;
        let test_arr = append_label(&test_x, &test_y)?;
        save_array(&self.config.transformed_train_file_path, &train_arr)?;
        save_array(&self.config.transformed_test_file_path, &test_arr)?;
        preprocessor.save(&self.config.transformed_object_file_path)?;
        preprocessor.save(&self.config.final_preprocessor_file_path)?;
        info!(
            train_shape = ?train_arr.shape(),
            test_shape = ?test_arr.shape(),
            preprocessor = %self.config.final_preprocessor_file_path.display(),
            "Finished data transformation"
        );

        Ok(DataTransformationArtifact {
            transformed_object_file_path: self.config.transformed_object_file_path.clone(),
            transformed_train_file_path: self.config.transformed_train_file_path.clone(),
            transformed_test_file_path: self.config.transformed_test_file_path.clone(),
        })
    }
}
