//! Trial history: JSONL append-only log of optimiser trials.
//!
//! Each line is an independent JSON object, so an interrupted search leaves a
//! readable file behind.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::optimize::TrialParams;
use crate::walk_forward::FoldRecord;

/// One optimiser trial: sampled parameters and what they scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial: usize,
    pub params: TrialParams,
    /// Combined fitness; `None` when the trial failed.
    pub score: Option<f64>,
    pub walk_forward_score: Option<f64>,
    pub unseen_score: Option<f64>,
    #[serde(default)]
    pub folds: Vec<FoldRecord>,
    #[serde(default)]
    pub unseen: Option<FoldRecord>,
    #[serde(default)]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TrialRecord {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// JSONL history file manager.
#[derive(Debug, Clone)]
pub struct TrialHistory {
    path: PathBuf,
}

impl TrialHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one record, creating the file and its directory on first use.
    pub fn append(&self, record: &TrialRecord) -> io::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()
    }

    /// Read every record. Malformed lines are skipped with a warning.
    pub fn read_all(&self) -> io::Result<Vec<TrialRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TrialRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(line = line_no + 1, error = %e, "skipping malformed history line")
                }
            }
        }
        Ok(records)
    }

    /// Highest-scoring successful trial on file.
    pub fn best(&self) -> io::Result<Option<TrialRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.score.is_some_and(f64::is_finite))
            .max_by(|a, b| {
                let (a, b) = (a.score.unwrap_or(0.0), b.score.unwrap_or(0.0));
                a.total_cmp(&b)
            }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
