//! Newline-delimited record file of generator completions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Record file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record on line {line}: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One choice returned by the generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    #[serde(default)]
    pub finish_reason: Option<String>,

    #[serde(default)]
    pub content: Option<String>,
}

impl Completion {
    /// Completed normally and carries text
    fn finished_content(&self) -> Option<&str> {
        match (self.finish_reason.as_deref(), self.content.as_deref()) {
            (Some("stop"), Some(content)) => Some(content),
            _ => None,
        }
    }
}

/// Appends completions to a JSONL file, one compact JSON document per line
#[derive(Debug, Clone)]
pub struct RecordWriter {
    path: PathBuf,
}

impl RecordWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append every finished choice whose content is JSON
    ///
    /// Content is re-serialized so stray whitespace and formatting from the
    /// generator do not reach the file. Choices that are not JSON are skipped.
    /// The batch goes out in a single write. Returns the number of lines
    /// written.
    pub fn append(&self, choices: &[Completion]) -> Result<usize, RecordError> {
        let rows: Vec<String> = choices
            .iter()
            .filter_map(Completion::finished_content)
            .filter_map(|content| match serde_json::from_str::<Value>(content.trim()) {
                Ok(row) => Some(row.to_string()),
                Err(e) => {
                    warn!(error = %e, "skipping completion that is not JSON");
                    None
                }
            })
            .collect();

        if rows.is_empty() {
            return Ok(0);
        }

        let mut batch = rows.join("\n");
        batch.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(batch.as_bytes())?;

        debug!(path = %self.path.display(), written = rows.len(), "appended completions");
        Ok(rows.len())
    }
}

/// Read every record back, skipping blank lines
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<Value>, RecordError> {
    let file = std::fs::File::open(path)?;
    let mut records = Vec::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| RecordError::InvalidRecord {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}
