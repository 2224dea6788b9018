//! Independent approval and lock records
//!
//! Approvals live in their own append-only JSONL file, never inside the
//! artifact file. Executors cross-check this book instead of trusting an
//! envelope's own `status` field, which could have been forged by editing
//! the artifact file directly.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::envelope::ArtifactId;
use crate::hash::ContentHash;

/// One approval: artifact id -> approver identity -> timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub artifact_id: ArtifactId,
    pub approved_by: String,
    pub approved_at_ms: u64,
    /// Payload hash at approval time
    pub payload_hash: ContentHash,
}

/// One lock: pins the payload hash that must never change again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub artifact_id: ArtifactId,
    pub payload_hash: ContentHash,
    pub locked_at_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum BookRecord {
    Approval(ApprovalRecord),
    Lock(LockRecord),
}

/// Errors reading or appending the approval book
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// Underlying I/O failure
    #[error("approval book I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A line in the book does not parse
    #[error("corrupt approval record at {path}:{line}: {message}")]
    Corrupt {
        path: String,
        line: usize,
        message: String,
    },
}

/// Append-only JSONL book of approval and lock records
///
/// Stateless between calls: every read scans the file, so concurrent
/// appenders from other processes are always observed.
#[derive(Debug, Clone)]
pub struct ApprovalBook {
    path: PathBuf,
}

impl ApprovalBook {
    /// Book backed by the given file (created on first append)
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an approval record
    pub fn record_approval(&self, record: ApprovalRecord) -> Result<(), ApprovalError> {
        self.append(&BookRecord::Approval(record))
    }

    /// Append a lock record
    pub fn record_lock(&self, record: LockRecord) -> Result<(), ApprovalError> {
        self.append(&BookRecord::Lock(record))
    }

    /// First approval record for an artifact, if any
    pub fn find_approval(
        &self,
        artifact_id: &ArtifactId,
    ) -> Result<Option<ApprovalRecord>, ApprovalError> {
        Ok(self.approvals()?.into_iter().find(|r| &r.artifact_id == artifact_id))
    }

    /// First lock record for an artifact, if any
    pub fn find_lock(&self, artifact_id: &ArtifactId) -> Result<Option<LockRecord>, ApprovalError> {
        Ok(self.locks()?.into_iter().find(|r| &r.artifact_id == artifact_id))
    }

    /// All approval records in append order
    pub fn approvals(&self) -> Result<Vec<ApprovalRecord>, ApprovalError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter_map(|r| match r {
                BookRecord::Approval(a) => Some(a),
                BookRecord::Lock(_) => None,
            })
            .collect())
    }

    /// All lock records in append order
    pub fn locks(&self) -> Result<Vec<LockRecord>, ApprovalError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter_map(|r| match r {
                BookRecord::Lock(l) => Some(l),
                BookRecord::Approval(_) => None,
            })
            .collect())
    }

    fn append(&self, record: &BookRecord) -> Result<(), ApprovalError> {
        let io_err = |source| ApprovalError::Io {
            path: self.path.display().to_string(),
            source,
        };

        let line = serde_json::to_string(record).map_err(|e| ApprovalError::Corrupt {
            path: self.path.display().to_string(),
            line: 0,
            message: e.to_string(),
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        writeln!(file, "{line}").map_err(io_err)?;
        file.flush().map_err(io_err)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<BookRecord>, ApprovalError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|source| ApprovalError::Io {
            path: self.path.display().to_string(),
            source,
        })?;

        let mut records = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|e| ApprovalError::Corrupt {
                path: self.path.display().to_string(),
                line: index + 1,
                message: e.to_string(),
            })?;
            records.push(record);
        }
        Ok(records)
    }
}
