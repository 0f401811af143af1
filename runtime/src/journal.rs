//! JSONL journal of load attempts made from the CLI.

use anyhow::{Context, Result};
use chrono::Utc;
use sdk_loader::{FailureClass, LoadError, LoaderConfig};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One load attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRecord {
    pub timestamp: String,
    pub key: String,
    /// Script URL with the credential masked.
    pub url: String,
    pub page: String,
    pub callers: usize,
    pub insertions: usize,
    pub outcome: String,
    pub class: Option<FailureClass>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl LoadRecord {
    pub fn new(
        config: &LoaderConfig,
        page: &str,
        callers: usize,
        insertions: usize,
        result: &std::result::Result<(), LoadError>,
        duration_ms: u64,
    ) -> Self {
        let (outcome, class, error) = match result {
            Ok(()) => ("ready", None, None),
            Err(e) => ("failed", Some(e.class()), Some(e.to_string())),
        };
        Self {
            timestamp: Utc::now().to_rfc3339(),
            key: config.cache_key(),
            url: config.redacted_url(),
            page: page.to_string(),
            callers,
            insertions,
            outcome: outcome.to_string(),
            class,
            error,
            duration_ms,
        }
    }
}

/// Append-only JSONL journal.
pub struct LoadJournal {
    file: File,
    path: PathBuf,
}

impl LoadJournal {
    /// Open or create the journal file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open load journal: {}", path.display()))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &LoadRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        writeln!(self.file, "{json}")?;
        Ok(())
    }

    /// Read the last `limit` records, oldest first. Malformed lines are skipped.
    pub fn tail(path: &Path, limit: usize) -> Result<Vec<LoadRecord>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path)
            .with_context(|| format!("failed to read load journal: {}", path.display()))?;

        let records: Vec<LoadRecord> = BufReader::new(file)
            .lines()
            .map_while(|line| line.ok())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();

        let skip = records.len().saturating_sub(limit);
        Ok(records.into_iter().skip(skip).collect())
    }
}
