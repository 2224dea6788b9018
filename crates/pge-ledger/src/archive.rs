//! Content-addressed diff archive
//!
//! One file per executed diff, named deterministically from timestamp and
//! executor name. The Blake3 hash recorded at write time is what the
//! governance pipeline later re-checks; a mismatch means the stored diff
//! was tampered with.

use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pge_artifact::ContentHash;

use crate::clock::MonotonicClock;
use crate::ledger::AuditError;

/// Stable reference to an archived diff (its file name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffRef(String);

impl DiffRef {
    /// Wrap an existing reference
    #[inline]
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// String view
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DiffRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of archiving a diff
#[derive(Debug, Clone, PartialEq)]
pub struct SavedDiff {
    pub reference: DiffRef,
    pub hash: ContentHash,
}

/// Directory of archived diff files
#[derive(Debug)]
pub struct DiffArchive {
    dir: PathBuf,
    clock: MonotonicClock,
}

impl DiffArchive {
    /// Archive rooted at `dir`, creating it if needed
    ///
    /// # Errors
    /// [`AuditError::ArchiveIo`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| AuditError::ArchiveIo {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir,
            clock: MonotonicClock::new(),
        })
    }

    /// Directory holding the diff files
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store diff text under `<epoch-ms>-<executor>.diff`
    ///
    /// Returns the reference and the content hash recorded at write
    /// time. Same-millisecond collisions get a numeric suffix so no diff
    /// is ever overwritten.
    pub fn save_diff(&self, content: &str, executor: &str) -> Result<SavedDiff, AuditError> {
        let timestamp = self.clock.now_ms();
        let mut name = format!("{timestamp}-{executor}.diff");
        let mut attempt = 0u32;
        while self.dir.join(&name).exists() {
            attempt += 1;
            name = format!("{timestamp}-{executor}-{attempt}.diff");
        }

        let path = self.dir.join(&name);
        fs::write(&path, content).map_err(|source| AuditError::ArchiveIo {
            path: path.display().to_string(),
            source,
        })?;

        let hash = ContentHash::compute(content.as_bytes());
        tracing::debug!(reference = %name, hash = %hash.short(), "archived diff");
        Ok(SavedDiff {
            reference: DiffRef::new(name),
            hash,
        })
    }

    /// Load archived diff text
    ///
    /// # Errors
    /// [`AuditError::DiffNotFound`] if absent.
    pub fn load(&self, reference: &DiffRef) -> Result<String, AuditError> {
        let path = self.dir.join(reference.as_str());
        if !path.exists() {
            return Err(AuditError::DiffNotFound {
                reference: reference.as_str().to_string(),
            });
        }
        fs::read_to_string(&path).map_err(|source| AuditError::ArchiveIo {
            path: path.display().to_string(),
            source,
        })
    }

    /// Recompute the stored diff's hash and compare to the recorded one
    ///
    /// # Errors
    /// [`AuditError::DiffHashMismatch`] on a mismatch; this is a tamper
    /// signal, not a retryable error.
    pub fn verify(&self, reference: &DiffRef, expected: ContentHash) -> Result<(), AuditError> {
        let content = self.load(reference)?;
        let actual = ContentHash::compute(content.as_bytes());
        if actual != expected {
            return Err(AuditError::DiffHashMismatch {
                reference: reference.as_str().to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}
