//! Audit log entry and its hash chain

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use pge_artifact::{ArtifactId, ContentHash};

/// Execution mode recorded with every entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    DryRun,
    Apply,
}

impl ExecutionMode {
    /// Stable identifier used in ledger lines
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Apply => "apply",
        }
    }
}

/// Outcome recorded with every entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

impl ExecutionStatus {
    /// Stable identifier used in ledger lines
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Entry content as produced by an executor, before stamping
///
/// The ledger assigns the timestamp and the chain fields at append time
/// under the file lock.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub executor: String,
    pub artifact_id: ArtifactId,
    pub status: ExecutionStatus,
    pub mode: ExecutionMode,
    pub diff_ref: Option<String>,
    pub diff_hash: Option<ContentHash>,
    pub affected_files: Vec<String>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// One immutable, self-contained ledger record
///
/// `prev_hash`/`hash` form a sha256 chain over the append order; both are
/// hex-encoded in the persisted line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp_ms: u64,
    pub executor: String,
    pub artifact_id: ArtifactId,
    pub status: ExecutionStatus,
    pub mode: ExecutionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_hash: Option<ContentHash>,
    pub affected_files: Vec<String>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub prev_hash: String,
    pub hash: String,
}

impl AuditLogEntry {
    /// Stamp a new entry into the chain
    #[must_use]
    pub(crate) fn stamped(new: NewAuditEntry, timestamp_ms: u64, prev_hash: &str) -> Self {
        let mut entry = Self {
            timestamp_ms,
            executor: new.executor,
            artifact_id: new.artifact_id,
            status: new.status,
            mode: new.mode,
            diff_ref: new.diff_ref,
            diff_hash: new.diff_hash,
            affected_files: new.affected_files,
            duration_ms: new.duration_ms,
            error: new.error,
            prev_hash: prev_hash.to_string(),
            hash: String::new(),
        };
        entry.hash = entry.compute_hash();
        entry
    }

    /// Recompute this entry's chain hash from its fields
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.timestamp_ms.to_le_bytes());
        hasher.update(self.executor.as_bytes());
        hasher.update([0]);
        hasher.update(self.artifact_id.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.status.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.mode.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.diff_ref.as_deref().unwrap_or("").as_bytes());
        hasher.update([0]);
        if let Some(diff_hash) = &self.diff_hash {
            hasher.update(diff_hash.as_bytes());
        }
        hasher.update([0]);
        for file in &self.affected_files {
            hasher.update(file.as_bytes());
            hasher.update([0]);
        }
        hasher.update(self.duration_ms.to_le_bytes());
        hasher.update(self.error.as_deref().unwrap_or("").as_bytes());
        hasher.update([0]);
        hasher.update(self.prev_hash.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// True when the stored hash matches a recomputation
    #[inline]
    #[must_use]
    pub fn verify(&self) -> bool {
        self.hash == self.compute_hash()
    }
}
