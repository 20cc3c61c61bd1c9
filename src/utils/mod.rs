//! Utility functions and types

pub mod data_loader;
pub mod frame;
pub mod persistence;

pub use data_loader::{DataLoader, DataSaver};
pub use frame::{feature_matrix, label_vector, numeric_column, string_column};
pub use persistence::{load_array, load_object, save_array, save_object, write_yaml_file};

use std::path::Path;

use crate::error::Result;

/// Create the parent directory of `path` if it is missing
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
