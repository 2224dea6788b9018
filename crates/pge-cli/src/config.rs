//! Process-wide configuration
//!
//! Loaded once from `pge.toml` at startup and passed explicitly into
//! each component constructor; there are no ambient registries, so
//! multiple governance runs in one process stay independent.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration for one governed repository
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PgeConfig {
    /// Repository root every declared path resolves inside
    pub repo_root: PathBuf,
    /// Directory of artifact envelope files
    pub artifacts_dir: PathBuf,
    /// Append-only audit ledger file
    pub ledger_path: PathBuf,
    /// Directory of archived diff files
    pub diffs_dir: PathBuf,
    /// Independent approval record file
    pub approvals_path: PathBuf,
    /// Optional project-level capability override document (JSON or YAML)
    pub capability_override: Option<PathBuf>,
    /// Reference point for changed-file queries
    pub vcs_base_ref: String,
    /// Delegated test runner argv; first element is the program
    pub test_command: Vec<String>,
    /// Repo-relative prefixes holding governance metadata
    pub governed_paths: Vec<String>,
}

impl Default for PgeConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            artifacts_dir: PathBuf::from(".pge/artifacts"),
            ledger_path: PathBuf::from(".pge/ledger.jsonl"),
            diffs_dir: PathBuf::from(".pge/diffs"),
            approvals_path: PathBuf::from(".pge/approvals.jsonl"),
            capability_override: None,
            vcs_base_ref: "HEAD".to_string(),
            test_command: vec!["cargo".to_string(), "test".to_string()],
            governed_paths: vec![".pge".to_string()],
        }
    }
}

impl PgeConfig {
    /// Load from a TOML file; a missing file yields the defaults
    ///
    /// # Errors
    /// Fails on unreadable or invalid TOML.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = toml::from_str(&text)?;
        Ok(config)
    }
}
