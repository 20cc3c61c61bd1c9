//! Saving and loading fitted objects, arrays and YAML reports

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{MaintenanceError, Result};
use crate::utils::ensure_parent_dir;

/// Serialize any value with bincode, creating parent directories
pub fn save_object<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, value)?;
    debug!(path = %path.display(), "Saved object");
    Ok(())
}

/// Load a value written by [`save_object`]
pub fn load_object<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        MaintenanceError::SerializationError(format!("cannot open {}: {}", path.display(), e))
    })?;
    let value = bincode::deserialize_from(BufReader::new(file))?;
    Ok(value)
}

/// Persist a numeric array
pub fn save_array(path: impl AsRef<Path>, array: &Array2<f64>) -> Result<()> {
    save_object(path, array)
}

/// Load a numeric array written by [`save_array`]
pub fn load_array(path: impl AsRef<Path>) -> Result<Array2<f64>> {
    load_object(path)
}

/// Write a value as YAML; an existing file is removed first when `replace` is set
pub fn write_yaml_file<T: Serialize>(path: impl AsRef<Path>, value: &T, replace: bool) -> Result<()> {
    let path = path.as_ref();
    if replace && path.exists() {
        std::fs::remove_file(path)?;
    }
    ensure_parent_dir(path)?;
    let writer = BufWriter::new(File::create(path)?);
    serde_yaml::to_writer(writer, value)?;
    debug!(path = %path.display(), "Wrote YAML");
    Ok(())
}

pub fn read_yaml_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_array_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("arrays").join("train.bin");
        let arr = array![[0.0, 0.5, 1.0], [1.0, 0.25, 0.0]];

        save_array(&path, &arr).unwrap();
        assert_eq!(load_array(&path).unwrap(), arr);
    }

    #[test]
    fn test_yaml_replace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.yaml");

        let mut first = BTreeMap::new();
        first.insert("a".to_string(), 1);
        write_yaml_file(&path, &first, false).unwrap();

        let mut second = BTreeMap::new();
        second.insert("b".to_string(), 2);
        write_yaml_file(&path, &second, true).unwrap();

        let loaded: BTreeMap<String, i32> = read_yaml_file(&path).unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn test_load_missing_object() {
        let result: Result<Vec<f64>> = load_object("/nonexistent/object.bin");
        assert!(matches!(result, Err(MaintenanceError::SerializationError(_))));
    }
}
