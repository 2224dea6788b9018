//! Declarative file-level diff model
//!
//! A [`DiffPlan`] describes a change set without touching the
//! repository: it is computed in step 6, archived as text, and applied
//! (or not) in step 7. The archived text is the plan's own JSON
//! rendering, so the declared file set can always be re-derived from the
//! archive alone.

use serde::{Deserialize, Serialize};

use crate::error::PlanFailure;

/// One file-level change
///
/// `Modify` and `Delete` carry the expected current content so the apply
/// step can detect drift between diff generation and application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum FileChange {
    Create { path: String, content: String },
    Modify {
        path: String,
        before: String,
        after: String,
    },
    Delete { path: String, before: String },
    Move { from: String, to: String },
}

impl FileChange {
    /// Repo-relative paths this change touches
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::Create { path, .. } | Self::Modify { path, .. } | Self::Delete { path, .. } => {
                vec![path]
            }
            Self::Move { from, to } => vec![from, to],
        }
    }
}

/// An ordered set of file-level changes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffPlan {
    pub changes: Vec<FileChange>,
}

impl DiffPlan {
    /// Empty plan
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan with the given changes
    #[inline]
    #[must_use]
    pub fn with_changes(changes: Vec<FileChange>) -> Self {
        Self { changes }
    }

    /// True when no change is declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Every path the plan touches, in declaration order, deduplicated
    #[must_use]
    pub fn affected_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        for change in &self.changes {
            for path in change.paths() {
                if !files.iter().any(|f| f == path) {
                    files.push(path.to_string());
                }
            }
        }
        files
    }

    /// Render to the archived text form
    #[must_use]
    pub fn render(&self) -> String {
        // Pretty JSON keeps the archive grep-able and diffs reviewable.
        serde_json::to_string_pretty(self).unwrap_or_else(|_| String::from("{}"))
    }

    /// Parse a previously rendered (or externally supplied) diff text
    ///
    /// # Errors
    /// [`PlanFailure::InvalidDiff`] if the text is not a diff plan.
    pub fn parse(text: &str) -> Result<Self, PlanFailure> {
        serde_json::from_str(text).map_err(|e| PlanFailure::InvalidDiff {
            message: e.to_string(),
        })
    }
}
