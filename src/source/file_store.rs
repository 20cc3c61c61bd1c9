//! Directory-backed document store
//!
//! Each collection is a JSON-lines file at `<root>/<database>/<collection>.jsonl`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Document, DocumentSink, DocumentSource, DOCUMENT_ID_KEY};
use crate::error::{MaintenanceError, Result};

#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing a collection
    pub fn collection_path(&self, database: &str, collection: &str) -> PathBuf {
        self.root.join(database).join(format!("{}.jsonl", collection))
    }
}

impl DocumentSource for FileDocumentStore {
    fn fetch_all(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
        let path = self.collection_path(database, collection);
        let file = File::open(&path).map_err(|e| {
            MaintenanceError::IngestionError(format!(
                "cannot open collection {}.{} at {}: {}",
                database,
                collection,
                path.display(),
                e
            ))
        })?;

        let mut documents = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(doc)) => documents.push(doc),
                Ok(_) => {
                    return Err(MaintenanceError::IngestionError(format!(
                        "{}:{} is not a JSON object",
                        path.display(),
                        line_no + 1
                    )))
                }
                Err(e) => {
                    return Err(MaintenanceError::IngestionError(format!(
                        "{}:{}: {}",
                        path.display(),
                        line_no + 1,
                        e
                    )))
                }
            }
        }

        debug!(database, collection, documents = documents.len(), "Fetched collection");
        Ok(documents)
    }
}

impl DocumentSink for FileDocumentStore {
    fn insert_many(&self, database: &str, collection: &str, records: Vec<Document>) -> Result<usize> {
        let path = self.collection_path(database, collection);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);

        let count = records.len();
        for mut doc in records {
            if !doc.contains_key(DOCUMENT_ID_KEY) {
                doc.insert(
                    DOCUMENT_ID_KEY.to_string(),
                    Value::String(Uuid::new_v4().simple().to_string()),
                );
            }
            serde_json::to_writer(&mut writer, &doc)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        info!(database, collection, inserted = count, "Inserted documents");
        Ok(count)
    }
}
