//! Version-control query port
//!
//! Governance needs one question answered: which files changed since a
//! reference point. The port keeps the pipeline tool-agnostic; [`GitVcs`]
//! shells out to git, [`StaticVcs`] is the in-memory double.

use std::path::PathBuf;
use std::process::Command;

/// Errors from version-control queries
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// The tool could not be spawned
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and reported failure; stderr is included verbatim
    #[error("{tool} failed: {stderr}")]
    CommandFailed { tool: String, stderr: String },
}

/// Changed-file-set query since a reference point
pub trait VcsQuery {
    /// Repo-relative paths changed since `base_ref`, including untracked
    /// files
    ///
    /// # Errors
    /// [`VcsError`] when the underlying tool fails; callers surface this
    /// as a stage failure, never silently.
    fn changed_files(&self, base_ref: &str) -> Result<Vec<String>, VcsError>;
}

/// Git adapter backed by `git diff --name-only` plus untracked files
#[derive(Debug, Clone)]
pub struct GitVcs {
    repo_root: PathBuf,
}

impl GitVcs {
    /// Adapter for the repository at `repo_root`
    #[inline]
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    fn git(&self, args: &[&str]) -> Result<Vec<String>, VcsError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .args(args)
            .output()
            .map_err(|source| VcsError::Spawn {
                tool: "git".to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                tool: "git".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

impl VcsQuery for GitVcs {
    fn changed_files(&self, base_ref: &str) -> Result<Vec<String>, VcsError> {
        let mut files = self.git(&["diff", "--name-only", base_ref])?;
        let untracked = self.git(&["ls-files", "--others", "--exclude-standard"])?;
        for file in untracked {
            if !files.contains(&file) {
                files.push(file);
            }
        }
        tracing::debug!(count = files.len(), base_ref, "queried changed files");
        Ok(files)
    }
}

/// In-memory double returning a fixed file set (or a fixed error)
#[derive(Debug, Clone, Default)]
pub struct StaticVcs {
    files: Vec<String>,
    error: Option<String>,
}

impl StaticVcs {
    /// Double reporting the given changed files
    #[must_use]
    pub fn with_files(files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            error: None,
        }
    }

    /// Double that fails every query
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            files: Vec::new(),
            error: Some(message.into()),
        }
    }
}

impl VcsQuery for StaticVcs {
    fn changed_files(&self, _base_ref: &str) -> Result<Vec<String>, VcsError> {
        match &self.error {
            Some(stderr) => Err(VcsError::CommandFailed {
                tool: "static".to_string(),
                stderr: stderr.clone(),
            }),
            None => Ok(self.files.clone()),
        }
    }
}
