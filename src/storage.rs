//! Activity storage
//!
//! The pipeline hands each aggregated activity to an [`ActivityStore`]. Stores
//! are passed in explicitly; nothing in the crate holds a global handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::types::ActivitySummary;

/// One persisted activity row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredActivity {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub summary: ActivitySummary,
}

impl StoredActivity {
    fn new(summary: &ActivitySummary) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            summary: summary.clone(),
        }
    }
}

/// Trait for activity storage backends
pub trait ActivityStore {
    /// Persist one activity as a new row
    fn insert(&mut self, summary: &ActivitySummary) -> Result<StoredActivity>;
}

impl<S: ActivityStore + ?Sized> ActivityStore for &mut S {
    fn insert(&mut self, summary: &ActivitySummary) -> Result<StoredActivity> {
        (**self).insert(summary)
    }
}

impl<S: ActivityStore + ?Sized> ActivityStore for Box<S> {
    fn insert(&mut self, summary: &ActivitySummary) -> Result<StoredActivity> {
        (**self).insert(summary)
    }
}

/// In-memory store, used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Vec<StoredActivity>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[StoredActivity] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl ActivityStore for MemoryStore {
    fn insert(&mut self, summary: &ActivitySummary) -> Result<StoredActivity> {
        let row = StoredActivity::new(summary);
        self.rows.push(row.clone());
        Ok(row)
    }
}

/// Append-only store writing one JSON object per line
#[derive(Debug)]
pub struct NdjsonStore {
    path: PathBuf,
    file: File,
}

impl NdjsonStore {
    /// Open `path` for appending, creating it and its parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| storage_error(&path, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| storage_error(&path, e))?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row of an existing store file
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<StoredActivity>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| storage_error(path, e))?;

        let mut rows = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| storage_error(path, e))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            rows.push(serde_json::from_str(trimmed)?);
        }
        Ok(rows)
    }
}

impl ActivityStore for NdjsonStore {
    fn insert(&mut self, summary: &ActivitySummary) -> Result<StoredActivity> {
        let row = StoredActivity::new(summary);
        let mut line = serde_json::to_string(&row)?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .map_err(|e| storage_error(&self.path, e))?;

        Ok(row)
    }
}

fn storage_error(path: &Path, err: std::io::Error) -> IngestError {
    IngestError::Storage(format!("{}: {}", path.display(), err))
}
