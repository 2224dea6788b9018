//! Artifact store port
//!
//! [`ArtifactStore`] is the load/save/list port the lifecycle and the
//! governance pipeline are built on. Two implementations ship:
//! [`FsArtifactStore`] (one JSON file per artifact, temp-then-rename
//! writes) for production and [`MemoryArtifactStore`] as the in-memory
//! test double.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::envelope::{ArtifactEnvelope, ArtifactId, ArtifactKind};

/// Errors raised by store implementations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No artifact with this id
    #[error("artifact not found: {id}")]
    NotFound { id: ArtifactId },

    /// Underlying I/O failure
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Persisted file is not a valid envelope
    #[error("corrupt artifact file {path}: {message}")]
    Corrupt { path: String, message: String },
}

/// Load/save/list port for artifact envelopes
pub trait ArtifactStore {
    /// Persist an envelope, replacing any previous version
    fn save(&self, envelope: &ArtifactEnvelope) -> Result<(), StoreError>;

    /// Load an envelope by id
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if absent.
    fn load(&self, id: &ArtifactId) -> Result<ArtifactEnvelope, StoreError>;

    /// Remove an envelope; loud if absent
    fn delete(&self, id: &ArtifactId) -> Result<(), StoreError>;

    /// All envelopes of one kind, id-ordered
    fn list_by_kind(&self, kind: ArtifactKind) -> Result<Vec<ArtifactEnvelope>, StoreError>;

    /// All envelopes, id-ordered
    fn list_all(&self) -> Result<Vec<ArtifactEnvelope>, StoreError>;
}

/// Filesystem store: one pretty-printed JSON file per artifact
///
/// Writes go to a `.tmp` sibling first and are renamed into place, so a
/// crash mid-write never leaves a half-written envelope behind.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    /// Open a store rooted at `dir`, creating it if needed
    ///
    /// # Errors
    /// [`StoreError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the artifact files
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &ArtifactId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read_envelope(path: &Path) -> Result<ArtifactEnvelope, StoreError> {
        let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(&self, envelope: &ArtifactEnvelope) -> Result<(), StoreError> {
        let path = self.path_for(&envelope.id);
        let tmp = path.with_extension("json.tmp");
        let io_err = |source, p: &Path| StoreError::Io {
            path: p.display().to_string(),
            source,
        };

        let text = serde_json::to_string_pretty(envelope).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(&tmp, text).map_err(|e| io_err(e, &tmp))?;
        fs::rename(&tmp, &path).map_err(|e| io_err(e, &path))?;
        Ok(())
    }

    fn load(&self, id: &ArtifactId) -> Result<ArtifactEnvelope, StoreError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(StoreError::NotFound { id: id.clone() });
        }
        Self::read_envelope(&path)
    }

    fn delete(&self, id: &ArtifactId) -> Result<(), StoreError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(StoreError::NotFound { id: id.clone() });
        }
        fs::remove_file(&path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn list_by_kind(&self, kind: ArtifactKind) -> Result<Vec<ArtifactEnvelope>, StoreError> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect())
    }

    fn list_all(&self) -> Result<Vec<ArtifactEnvelope>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.display().to_string(),
            source,
        })?;

        let mut envelopes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                envelopes.push(Self::read_envelope(&path)?);
            }
        }
        envelopes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(envelopes)
    }
}

/// In-memory store double
///
/// Keeps envelopes in a `BTreeMap` behind a mutex; a poisoned lock is
/// recovered rather than propagated since the map stays consistent after
/// any single operation.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    inner: Mutex<BTreeMap<ArtifactId, ArtifactEnvelope>>,
}

impl MemoryArtifactStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_map<R>(&self, f: impl FnOnce(&mut BTreeMap<ArtifactId, ArtifactEnvelope>) -> R) -> R {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save(&self, envelope: &ArtifactEnvelope) -> Result<(), StoreError> {
        self.with_map(|map| {
            map.insert(envelope.id.clone(), envelope.clone());
        });
        Ok(())
    }

    fn load(&self, id: &ArtifactId) -> Result<ArtifactEnvelope, StoreError> {
        self.with_map(|map| {
            map.get(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound { id: id.clone() })
        })
    }

    fn delete(&self, id: &ArtifactId) -> Result<(), StoreError> {
        self.with_map(|map| {
            map.remove(id)
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound { id: id.clone() })
        })
    }

    fn list_by_kind(&self, kind: ArtifactKind) -> Result<Vec<ArtifactEnvelope>, StoreError> {
        self.with_map(|map| Ok(map.values().filter(|e| e.kind == kind).cloned().collect()))
    }

    fn list_all(&self) -> Result<Vec<ArtifactEnvelope>, StoreError> {
        self.with_map(|map| Ok(map.values().cloned().collect()))
    }
}
