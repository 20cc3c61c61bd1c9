//! Document sources for raw telemetry
//!
//! Raw records live in a document store as flat JSON objects. The ingestion
//! stage reads a whole collection through [`DocumentSource`] and turns it into
//! a table with [`documents_to_frame`].

mod file_store;

pub use file_store::FileDocumentStore;

use std::path::Path;

use polars::prelude::*;
use serde_json::{Map, Number, Value};

use crate::error::{MaintenanceError, Result};
use crate::utils::DataLoader;

/// A single record as stored in a collection
pub type Document = Map<String, Value>;

/// Key the store assigns to every inserted document
pub const DOCUMENT_ID_KEY: &str = "_id";

/// Sentinel string the raw data uses for missing values
pub const MISSING_SENTINEL: &str = "na";

/// Read access to a document store
pub trait DocumentSource: Send + Sync {
    /// Every document of a collection, in insertion order
    fn fetch_all(&self, database: &str, collection: &str) -> Result<Vec<Document>>;
}

/// Write access to a document store
pub trait DocumentSink {
    /// Append documents to a collection and return how many were written
    fn insert_many(&self, database: &str, collection: &str, records: Vec<Document>) -> Result<usize>;
}

#[derive(Clone, Copy, PartialEq)]
enum ColumnKind {
    Empty,
    Int,
    Float,
    Bool,
    Text,
}

impl ColumnKind {
    fn widen(self, value: &Value) -> Self {
        let observed = match value {
            Value::Null => return self,
            Value::Number(n) if n.is_i64() => ColumnKind::Int,
            Value::Number(_) => ColumnKind::Float,
            Value::Bool(_) => ColumnKind::Bool,
            _ => ColumnKind::Text,
        };
        match (self, observed) {
            (ColumnKind::Empty, k) => k,
            (a, b) if a == b => a,
            (ColumnKind::Int, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        }
    }
}

fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s == MISSING_SENTINEL,
        _ => false,
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Build a table from documents
///
/// The `_id` key is dropped and the `"na"` sentinel becomes null. Column order
/// follows first appearance; a column whose non-null values are all integers
/// becomes `Int64`, all numbers `Float64`, all booleans `Boolean`, anything
/// else `String`.
pub fn documents_to_frame(documents: &[Document]) -> Result<DataFrame> {
    let mut names: Vec<&str> = Vec::new();
    for doc in documents {
        for key in doc.keys() {
            if key != DOCUMENT_ID_KEY && !names.contains(&key.as_str()) {
                names.push(key);
            }
        }
    }

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let values: Vec<&Value> = documents
            .iter()
            .map(|doc| match doc.get(name) {
                Some(v) if !is_missing(v) => v,
                _ => &Value::Null,
            })
            .collect();
        let kind = values.iter().fold(ColumnKind::Empty, |k, v| k.widen(v));

        let column = match kind {
            ColumnKind::Int => {
                let data: Vec<Option<i64>> = values.iter().map(|v| v.as_i64()).collect();
                Column::new(name.into(), data)
            }
            ColumnKind::Float => {
                let data: Vec<Option<f64>> = values.iter().map(|v| v.as_f64()).collect();
                Column::new(name.into(), data)
            }
            ColumnKind::Bool => {
                let data: Vec<Option<bool>> = values.iter().map(|v| v.as_bool()).collect();
                Column::new(name.into(), data)
            }
            ColumnKind::Text | ColumnKind::Empty => {
                let data: Vec<Option<String>> = values.iter().map(|v| value_as_text(v)).collect();
                Column::new(name.into(), data)
            }
        };
        columns.push(column);
    }

    Ok(DataFrame::new(columns)?)
}

fn any_value_to_json(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int8(v) => Value::from(v),
        AnyValue::Int16(v) => Value::from(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt8(v) => Value::from(v),
        AnyValue::UInt16(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => Number::from_f64(v as f64).map_or(Value::Null, Value::Number),
        AnyValue::Float64(v) => Number::from_f64(v).map_or(Value::Null, Value::Number),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        other => Value::String(other.to_string()),
    }
}

/// Convert every row of a table into a document
pub fn frame_to_documents(df: &DataFrame) -> Result<Vec<Document>> {
    let columns = df.get_columns();
    let mut documents = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let mut doc = Document::new();
        for column in columns {
            let value = column.get(row)?;
            doc.insert(column.name().to_string(), any_value_to_json(value));
        }
        documents.push(doc);
    }
    Ok(documents)
}

/// Read a CSV file into documents ready for insertion
pub fn records_from_csv(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let df = DataLoader::new()
        .with_full_schema_inference()
        .load_csv(path)
        .map_err(|e| MaintenanceError::IngestionError(format!("{}: {}", path.display(), e)))?;
    frame_to_documents(&df)
}
