//! Append-only ledger file with cross-process locking

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use pge_artifact::{ArtifactId, ContentHash};

use crate::clock::MonotonicClock;
use crate::entry::{AuditLogEntry, NewAuditEntry};

/// Errors raised by the audit ledger and diff archive
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The ledger could not be written; the whole execution is then
    /// invalid even if every earlier step succeeded
    #[error("ledger write failed at {path}: {source}")]
    LedgerWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The ledger could not be read
    #[error("ledger unreadable at {path}: {source}")]
    LedgerRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A ledger line does not parse as an entry
    #[error("corrupt ledger line {line} in {path}: {message}")]
    Corrupt {
        path: String,
        line: usize,
        message: String,
    },

    /// The sha256 chain does not hold; the file was rewritten in place
    #[error("ledger hash chain broken at line {line} in {path}")]
    ChainBroken { path: String, line: usize },

    /// Diff archive I/O failure
    #[error("diff archive I/O error at {path}: {source}")]
    ArchiveIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// No archived diff under this reference
    #[error("archived diff not found: {reference}")]
    DiffNotFound { reference: String },

    /// Stored diff no longer matches the hash recorded at write time
    #[error("diff {reference} hash mismatch: expected {expected}, got {actual}")]
    DiffHashMismatch {
        reference: String,
        expected: ContentHash,
        actual: ContentHash,
    },
}

/// The append-only execution log
///
/// One self-contained JSON record per line. Appends take an exclusive
/// advisory lock on the ledger file for the duration of the write and
/// fsync before releasing it, so concurrent processes never interleave
/// partial records and none are lost.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    clock: MonotonicClock,
}

impl Ledger {
    /// Ledger backed by the given file (created on first append)
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clock: MonotonicClock::new(),
        }
    }

    /// Path of the ledger file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, stamping its timestamp and chain fields
    ///
    /// Blocks until the exclusive lock is acquired; there is no ordering
    /// guarantee between contenders beyond each append being atomic.
    ///
    /// # Errors
    /// [`AuditError::LedgerWrite`] on any I/O failure.
    pub fn append(&self, new: NewAuditEntry) -> Result<AuditLogEntry, AuditError> {
        let write_err = |source| AuditError::LedgerWrite {
            path: self.path.display().to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        file.lock_exclusive().map_err(write_err)?;

        // Read the tail under the lock so the chain also holds across
        // processes, then append and flush durably before releasing.
        let result = (|| {
            let mut text = String::new();
            file.read_to_string(&mut text).map_err(write_err)?;
            let prev_hash = text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .next_back()
                .and_then(|line| serde_json::from_str::<AuditLogEntry>(line).ok())
                .map(|entry| entry.hash)
                .unwrap_or_default();

            let entry = AuditLogEntry::stamped(new, self.clock.now_ms(), &prev_hash);
            let line = serde_json::to_string(&entry).map_err(|e| AuditError::Corrupt {
                path: self.path.display().to_string(),
                line: 0,
                message: e.to_string(),
            })?;
            writeln!(file, "{line}").map_err(write_err)?;
            file.flush().map_err(write_err)?;
            file.sync_all().map_err(write_err)?;
            Ok(entry)
        })();

        let _ = fs2::FileExt::unlock(&file);
        if let Ok(entry) = &result {
            tracing::debug!(
                executor = %entry.executor,
                artifact = %entry.artifact_id,
                status = entry.status.as_str(),
                "appended ledger entry"
            );
        }
        result
    }

    /// All entries in append order
    ///
    /// # Errors
    /// [`AuditError::Corrupt`] on the first malformed line.
    pub fn read_all(&self) -> Result<Vec<AuditLogEntry>, AuditError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|source| AuditError::LedgerRead {
            path: self.path.display().to_string(),
            source,
        })?;

        let mut entries = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(line).map_err(|e| AuditError::Corrupt {
                path: self.path.display().to_string(),
                line: index + 1,
                message: e.to_string(),
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Last `limit` entries, oldest first
    pub fn read_recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>, AuditError> {
        let mut entries = self.read_all()?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }

    /// Every entry referencing the given artifact, in append order
    pub fn read_for_artifact(
        &self,
        artifact_id: &ArtifactId,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|entry| &entry.artifact_id == artifact_id)
            .collect())
    }

    /// Verify the whole sha256 chain; returns the number of entries
    ///
    /// # Errors
    /// [`AuditError::ChainBroken`] at the first entry whose `prev_hash`
    /// does not match its predecessor or whose own hash does not
    /// recompute.
    pub fn verify_chain(&self) -> Result<usize, AuditError> {
        let entries = self.read_all()?;
        let mut prev = String::new();
        for (index, entry) in entries.iter().enumerate() {
            if entry.prev_hash != prev || !entry.verify() {
                return Err(AuditError::ChainBroken {
                    path: self.path.display().to_string(),
                    line: index + 1,
                });
            }
            prev.clone_from(&entry.hash);
        }
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{ExecutionMode, ExecutionStatus};

    fn new_entry(executor: &str, artifact: &str) -> NewAuditEntry {
        NewAuditEntry {
            executor: executor.to_string(),
            artifact_id: ArtifactId::new(artifact),
            status: ExecutionStatus::Success,
            mode: ExecutionMode::DryRun,
            diff_ref: None,
            diff_hash: None,
            affected_files: vec!["src/lib.rs".to_string()],
            duration_ms: 3,
            error: None,
        }
    }

    fn ledger() -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("ledger.jsonl"));
        (dir, ledger)
    }

    #[test]
    fn append_and_read_back() {
        let (_dir, ledger) = ledger();
        ledger.append(new_entry("scaffold", "scaffold-plan-1")).unwrap();
        ledger.append(new_entry("refactor", "refactor-plan-1")).unwrap();

        let entries = ledger.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].executor, "scaffold");
        assert_eq!(entries[1].executor, "refactor");
    }

    #[test]
    fn timestamps_never_decrease() {
        let (_dir, ledger) = ledger();
        for i in 0..20 {
            ledger.append(new_entry("scaffold", &format!("p-{i}"))).unwrap();
        }
        let entries = ledger.read_all().unwrap();
        for pair in entries.windows(2) {
            assert!(pair[1].timestamp_ms >= pair[0].timestamp_ms);
        }
    }

    #[test]
    fn chain_verifies_after_appends() {
        let (_dir, ledger) = ledger();
        for i in 0..5 {
            ledger.append(new_entry("diff_apply", &format!("impl-{i}"))).unwrap();
        }
        assert_eq!(ledger.verify_chain().unwrap(), 5);
    }

    #[test]
    fn rewritten_line_breaks_chain() {
        let (_dir, ledger) = ledger();
        ledger.append(new_entry("scaffold", "a")).unwrap();
        ledger.append(new_entry("scaffold", "b")).unwrap();

        // Rewrite the first line in place, preserving line count.
        let text = std::fs::read_to_string(ledger.path()).unwrap();
        let mut lines: Vec<String> = text.lines().map(String::from).collect();
        let mut first: AuditLogEntry = serde_json::from_str(&lines[0]).unwrap();
        first.executor = "forged".to_string();
        lines[0] = serde_json::to_string(&first).unwrap();
        std::fs::write(ledger.path(), lines.join("\n") + "\n").unwrap();

        assert!(matches!(
            ledger.verify_chain(),
            Err(AuditError::ChainBroken { line: 1, .. })
        ));
    }

    #[test]
    fn read_recent_returns_tail() {
        let (_dir, ledger) = ledger();
        for i in 0..6 {
            ledger.append(new_entry("scaffold", &format!("p-{i}"))).unwrap();
        }
        let tail = ledger.read_recent(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].artifact_id, ArtifactId::new("p-5"));
    }

    #[test]
    fn read_for_artifact_filters() {
        let (_dir, ledger) = ledger();
        ledger.append(new_entry("scaffold", "plan-a")).unwrap();
        ledger.append(new_entry("refactor", "plan-b")).unwrap();
        ledger.append(new_entry("diff_apply", "plan-a")).unwrap();

        let entries = ledger.read_for_artifact(&ArtifactId::new("plan-a")).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn concurrent_appends_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        // Two simulated callers: separate Ledger instances over the same
        // file, appending from separate threads.
        let handles: Vec<_> = (0..2)
            .map(|caller| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let ledger = Ledger::new(path);
                    for i in 0..25 {
                        ledger
                            .append(new_entry("scaffold", &format!("c{caller}-{i}")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ledger = Ledger::new(path);
        let entries = ledger.read_all().unwrap();
        assert_eq!(entries.len(), 50);
        // Every line parsed as a well-formed entry and the chain holds.
        assert_eq!(ledger.verify_chain().unwrap(), 50);
    }

    #[test]
    fn missing_ledger_reads_empty() {
        let (_dir, ledger) = ledger();
        assert!(ledger.read_all().unwrap().is_empty());
        assert_eq!(ledger.verify_chain().unwrap(), 0);
    }
}
