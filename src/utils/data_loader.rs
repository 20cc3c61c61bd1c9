//! CSV loading and saving

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::error::{MaintenanceError, Result};
use crate::utils::ensure_parent_dir;

/// CSV reader for telemetry tables
pub struct DataLoader {
    /// Rows inspected when inferring column types
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(100),
        }
    }

    /// Inspect every row when inferring types
    pub fn with_full_schema_inference(mut self) -> Self {
        self.infer_schema_length = None;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            MaintenanceError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file)
            .finish()?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
        Ok(df)
    }

    /// Parse CSV bytes already in memory
    pub fn load_csv_bytes(&self, data: &[u8]) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(Cursor::new(data))
            .finish()?;
        Ok(df)
    }
}

/// CSV writer for telemetry tables
pub struct DataSaver;

impl DataSaver {
    /// Write a frame with a header row, creating parent directories
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let mut file = File::create(path)?;

        CsvWriter::new(&mut file).include_header(true).finish(df)?;

        debug!(path = %path.display(), rows = df.height(), "Saved CSV");
        Ok(())
    }

    /// Render a frame as CSV bytes
    pub fn to_csv_bytes(df: &mut DataFrame) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer).include_header(true).finish(df)?;
        Ok(buffer)
    }
}
