//! Scaffold creation executor
//!
//! Creates the files a ScaffoldPlan declares, each containing only the
//! placeholder marker, never real content. Pre-existing files are
//! skipped with a log note rather than failed.

use serde::Deserialize;

use pge_artifact::{ArtifactEnvelope, ArtifactKind};
use pge_capability::MechanicalOperation;

use crate::diff::{DiffPlan, FileChange};
use crate::engine::{ExecutorContext, ExecutorVariant};
use crate::error::{ExecutorError, PreconditionError};
use crate::paths::resolve_in_root;

/// Placeholder content written into every scaffolded file
pub const SCAFFOLD_MARKER: &str = "[scaffold placeholder]\n";

#[derive(Debug, Deserialize)]
struct ScaffoldPayload {
    files: Vec<String>,
}

fn payload(envelope: &ArtifactEnvelope) -> ScaffoldPayload {
    // Schema validation ran in step 2, so the shape is guaranteed here.
    serde_json::from_value(envelope.payload.clone())
        .unwrap_or(ScaffoldPayload { files: Vec::new() })
}

/// Scaffold variant of the nine-step contract
#[derive(Debug, Default)]
pub struct ScaffoldExecutor;

impl ScaffoldExecutor {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExecutorVariant for ScaffoldExecutor {
    fn name(&self) -> &'static str {
        "scaffold"
    }

    fn expected_kind(&self) -> ArtifactKind {
        ArtifactKind::ScaffoldPlan
    }

    fn declared_files(&self, envelope: &ArtifactEnvelope) -> Vec<String> {
        payload(envelope).files
    }

    fn requested_operations(&self, _envelope: &ArtifactEnvelope) -> Vec<MechanicalOperation> {
        vec![MechanicalOperation::CreateFile]
    }

    fn check_preconditions(&self, ctx: &ExecutorContext<'_>) -> Result<(), ExecutorError> {
        for file in payload(ctx.envelope).files {
            let resolved = resolve_in_root(ctx.repo_root, &file)?;
            if resolved.is_dir() {
                return Err(PreconditionError::AlreadyExists { path: file }.into());
            }
        }
        Ok(())
    }

    fn build_diff(
        &self,
        ctx: &ExecutorContext<'_>,
        logs: &mut Vec<String>,
    ) -> Result<DiffPlan, ExecutorError> {
        let mut changes = Vec::new();
        for file in payload(ctx.envelope).files {
            let resolved = resolve_in_root(ctx.repo_root, &file)?;
            if resolved.exists() {
                logs.push(format!("skipping existing file: {file}"));
                continue;
            }
            changes.push(FileChange::Create {
                path: file,
                content: SCAFFOLD_MARKER.to_string(),
            });
        }
        Ok(DiffPlan::with_changes(changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn envelope(files: serde_json::Value) -> ArtifactEnvelope {
        ArtifactEnvelope::new_draft(
            ArtifactKind::ScaffoldPlan,
            json!({"files": files, "language": "rust"}),
            BTreeSet::new(),
        )
    }

    #[test]
    fn builds_create_changes_with_marker_only() {
        let repo = tempfile::tempdir().unwrap();
        let envelope = envelope(json!(["src/a.rs", "src/b.rs"]));
        let ctx = ExecutorContext {
            repo_root: repo.path(),
            envelope: &envelope,
            protected_paths: &[],
        };

        let mut logs = Vec::new();
        let plan = ScaffoldExecutor::new().build_diff(&ctx, &mut logs).unwrap();
        assert_eq!(plan.changes.len(), 2);
        for change in &plan.changes {
            match change {
                FileChange::Create { content, .. } => assert_eq!(content, SCAFFOLD_MARKER),
                other => panic!("unexpected change: {other:?}"),
            }
        }
    }

    #[test]
    fn existing_files_are_skipped_not_failed() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(repo.path().join("src")).unwrap();
        std::fs::write(repo.path().join("src/a.rs"), "real content\n").unwrap();

        let envelope = envelope(json!(["src/a.rs", "src/b.rs"]));
        let ctx = ExecutorContext {
            repo_root: repo.path(),
            envelope: &envelope,
            protected_paths: &[],
        };

        let mut logs = Vec::new();
        let plan = ScaffoldExecutor::new().build_diff(&ctx, &mut logs).unwrap();
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(logs, vec!["skipping existing file: src/a.rs"]);
    }

    #[test]
    fn escaping_path_fails_preconditions() {
        let repo = tempfile::tempdir().unwrap();
        let envelope = envelope(json!(["../outside.rs"]));
        let ctx = ExecutorContext {
            repo_root: repo.path(),
            envelope: &envelope,
            protected_paths: &[],
        };

        let result = ScaffoldExecutor::new().check_preconditions(&ctx);
        assert!(matches!(
            result,
            Err(ExecutorError::Precondition(PreconditionError::PathEscapesRoot { .. }))
        ));
    }

    #[test]
    fn requests_create_file_capability() {
        let envelope = envelope(json!(["src/a.rs"]));
        assert_eq!(
            ScaffoldExecutor::new().requested_operations(&envelope),
            vec![MechanicalOperation::CreateFile]
        );
    }
}
