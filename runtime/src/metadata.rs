//! Download records and their on-disk `metadata.json`.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// File name of the record array inside the output root.
pub const METADATA_FILE: &str = "metadata.json";

/// One successfully saved image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub url: String,
    pub category: String,
    /// File name inside `{output_root}/{category}/`.
    pub filename: String,
    /// The image element's `title` attribute, or empty.
    pub title: String,
    /// The image element's `alt` attribute, or empty.
    pub alt: String,
}

/// Append-only record collection shared by download workers.
#[derive(Debug, Default)]
pub struct RecordLog {
    records: Mutex<Vec<DownloadRecord>>,
}

impl RecordLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: DownloadRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the records so far, in append order.
    fn snapshot(&self) -> Vec<DownloadRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn into_records(self) -> Vec<DownloadRecord> {
        self.records
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Write every record to `{output_root}/metadata.json` as a pretty JSON
    /// array. Writes nothing and returns `None` when the log is empty.
    pub fn persist(&self, output_root: &Path) -> std::io::Result<Option<PathBuf>> {
        let records = self.snapshot();
        if records.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(output_root)?;
        let path = output_root.join(METADATA_FILE);
        let json = serde_json::to_string_pretty(&records).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;

        tracing::info!("saved {} records to {}", records.len(), path.display());
        Ok(Some(path))
    }
}

/// Read a `metadata.json` written by `RecordLog::persist`.
pub fn load(path: &Path) -> anyhow::Result<Vec<DownloadRecord>> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}
