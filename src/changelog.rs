//! Persisted per-project change log.
//!
//! One JSON file per project, newest entry first, rewritten whole on every
//! mutation. Loading is forgiving: any I/O or parse problem yields an
//! empty log rather than an error, since the log is advisory history.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One committed batch. `commit_hash` doubles as the entry id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    pub commit_hash: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    #[serde(default)]
    pub is_validated: bool,
}

impl ChangeLogEntry {
    pub fn new(commit_hash: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            commit_hash: commit_hash.into(),
            timestamp: Utc::now(),
            summary: summary.into(),
            is_validated: false,
        }
    }
}

pub struct ChangeLogStore {
    path: PathBuf,
    entries: Vec<ChangeLogEntry>,
}

impl ChangeLogStore {
    /// Load the log for a project, defaulting to empty on any failure.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self { path, entries }
    }

    /// Newest-first view of the log.
    pub fn entries(&self) -> &[ChangeLogEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&ChangeLogEntry> {
        self.entries.first()
    }

    pub fn find(&self, commit_hash: &str) -> Option<&ChangeLogEntry> {
        self.entries.iter().find(|e| e.commit_hash == commit_hash)
    }

    /// Prepend an entry and rewrite the file.
    pub fn append(&mut self, entry: ChangeLogEntry) -> Result<()> {
        self.entries.insert(0, entry);
        self.persist()
    }

    /// Remove the entry with the given hash and rewrite the file.
    /// Returns the removed entry, if any.
    pub fn remove(&mut self, commit_hash: &str) -> Result<Option<ChangeLogEntry>> {
        let Some(index) = self
            .entries
            .iter()
            .position(|e| e.commit_hash == commit_hash)
        else {
            return Ok(None);
        };
        let removed = self.entries.remove(index);
        self.persist()?;
        Ok(Some(removed))
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(&self.entries).context("Failed to serialize change log")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write change log {}", self.path.display()))?;
        Ok(())
    }
}
