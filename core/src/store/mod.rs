//! Completed-task records
//!
//! One JSON file under the data directory holds every completed sourcing
//! task. Writes go through a temp file and rename so a crash mid-save
//! never corrupts the records.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// One completed sourcing task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcingRecord {
    pub task_id: String,
    pub query: String,
    pub result: Value,
    pub status: String,
    pub completed_at: DateTime<Utc>,
}

impl SourcingRecord {
    pub fn completed(task_id: impl Into<String>, query: impl Into<String>, result: Value) -> Self {
        Self {
            task_id: task_id.into(),
            query: query.into(),
            result,
            status: "completed".to_string(),
            completed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsFile {
    pub schema_version: u32,
    pub records: Vec<SourcingRecord>,
}

impl Default for RecordsFile {
    fn default() -> Self {
        Self {
            schema_version: 1,
            records: Vec::new(),
        }
    }
}

pub struct ResultStore {
    root_dir: PathBuf,
    records_path: PathBuf,
}

impl ResultStore {
    pub fn new_in(root_dir: PathBuf) -> Self {
        let records_path = root_dir.join("results.json");
        Self {
            root_dir,
            records_path,
        }
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    pub fn load(&self) -> Result<RecordsFile> {
        if !self.records_path.exists() {
            return Ok(RecordsFile::default());
        }

        let content = fs::read_to_string(&self.records_path)
            .with_context(|| format!("Failed to read results file: {:?}", self.records_path))?;

        if content.trim().is_empty() {
            return Ok(RecordsFile::default());
        }

        let parsed: RecordsFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse results file: {:?}", self.records_path))?;

        Ok(parsed)
    }

    pub fn save(&self, records_file: &RecordsFile) -> Result<()> {
        fs::create_dir_all(&self.root_dir)
            .with_context(|| format!("Failed to create results dir: {:?}", self.root_dir))?;

        let content =
            serde_json::to_string_pretty(records_file).context("Failed to serialize results")?;

        atomic_write(&self.records_path, content.as_bytes()).with_context(|| {
            format!(
                "Failed to atomically write results file: {:?}",
                self.records_path
            )
        })?;

        Ok(())
    }

    /// Append one completed record, preserving everything already stored.
    pub fn append(&self, record: SourcingRecord) -> Result<()> {
        let mut records_file = self.load()?;
        records_file.records.push(record);
        self.save(&records_file)
    }
}

fn atomic_write(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = dest
        .parent()
        .context("Destination path has no parent directory")?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent dir: {:?}", parent))?;

    let tmp = dest.with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));

    fs::write(&tmp, bytes).with_context(|| format!("Failed to write temp file: {:?}", tmp))?;

    // Best-effort cleanup on failure.
    if let Err(rename_err) = fs::rename(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(rename_err).context("Failed to rename temp file into place");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_then_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ResultStore::new_in(dir.path().to_path_buf());

        store
            .append(SourcingRecord::completed(
                "task-1",
                "camping chair",
                json!({"market_analysis": "niche"}),
            ))
            .expect("append");
        store
            .append(SourcingRecord::completed(
                "task-2",
                "wireless earbuds",
                json!({"raw_output": "unstructured"}),
            ))
            .expect("append");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.schema_version, 1);
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[0].task_id, "task-1");
        assert_eq!(loaded.records[1].query, "wireless earbuds");
        assert_eq!(loaded.records[1].status, "completed");
    }

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ResultStore::new_in(dir.path().join("nested"));
        let loaded = store.load().expect("load");
        assert_eq!(loaded.schema_version, 1);
        assert!(loaded.records.is_empty());
    }

    #[test]
    fn empty_file_is_treated_as_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ResultStore::new_in(dir.path().to_path_buf());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(store.records_path(), "  \n").unwrap();
        let loaded = store.load().expect("load");
        assert!(loaded.records.is_empty());
    }
}
