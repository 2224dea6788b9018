//! Diff application executor
//!
//! Never computes a diff itself: it applies the diff an
//! ImplementationPlan carries, which was approved elsewhere. Before
//! anything runs, the diff's declared file set is re-verified against
//! the plan's authorized targets, and no declared file may sit under a
//! protected test path while a TestPlan is locked.

use serde::Deserialize;

use pge_artifact::{ArtifactEnvelope, ArtifactKind};
use pge_capability::MechanicalOperation;

use crate::diff::{DiffPlan, FileChange};
use crate::engine::{ExecutorContext, ExecutorVariant};
use crate::error::{ExecutorError, PreconditionError};
use crate::paths::{is_under, resolve_in_root};

#[derive(Debug, Deserialize)]
struct ImplementationPayload {
    targets: Vec<String>,
    diff: String,
}

fn payload(envelope: &ArtifactEnvelope) -> ImplementationPayload {
    // Schema validation ran in step 2, so the shape is guaranteed here.
    serde_json::from_value(envelope.payload.clone()).unwrap_or(ImplementationPayload {
        targets: Vec::new(),
        diff: String::new(),
    })
}

/// Diff-apply variant of the nine-step contract
#[derive(Debug, Default)]
pub struct DiffApplyExecutor;

impl DiffApplyExecutor {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExecutorVariant for DiffApplyExecutor {
    fn name(&self) -> &'static str {
        "diff_apply"
    }

    fn expected_kind(&self) -> ArtifactKind {
        ArtifactKind::ImplementationPlan
    }

    fn declared_files(&self, envelope: &ArtifactEnvelope) -> Vec<String> {
        payload(envelope).targets
    }

    fn requested_operations(&self, _envelope: &ArtifactEnvelope) -> Vec<MechanicalOperation> {
        vec![MechanicalOperation::ApplyDiff]
    }

    fn check_preconditions(&self, ctx: &ExecutorContext<'_>) -> Result<(), ExecutorError> {
        let payload = payload(ctx.envelope);
        let plan = DiffPlan::parse(&payload.diff)?;

        for file in plan.affected_files() {
            if !payload.targets.iter().any(|t| t == &file) {
                return Err(PreconditionError::TargetNotAuthorized { path: file }.into());
            }
            if let Some(protected) = ctx
                .protected_paths
                .iter()
                .find(|prefix| is_under(&file, prefix))
            {
                tracing::warn!(file = %file, protected = %protected, "diff touches protected test path");
                return Err(PreconditionError::ProtectedPathModified { path: file }.into());
            }
            resolve_in_root(ctx.repo_root, &file)?;
        }

        // Modify/Delete need their current file, Move needs a free
        // destination; surfacing this here keeps DRY_RUN honest.
        for change in &plan.changes {
            match change {
                FileChange::Modify { path, .. } | FileChange::Delete { path, .. } => {
                    if !resolve_in_root(ctx.repo_root, path)?.exists() {
                        return Err(PreconditionError::NotFound { path: path.clone() }.into());
                    }
                }
                FileChange::Move { from, to } => {
                    if !resolve_in_root(ctx.repo_root, from)?.exists() {
                        return Err(PreconditionError::NotFound { path: from.clone() }.into());
                    }
                    if resolve_in_root(ctx.repo_root, to)?.exists() {
                        return Err(PreconditionError::AlreadyExists { path: to.clone() }.into());
                    }
                }
                FileChange::Create { .. } => {}
            }
        }
        Ok(())
    }

    fn build_diff(
        &self,
        ctx: &ExecutorContext<'_>,
        logs: &mut Vec<String>,
    ) -> Result<DiffPlan, ExecutorError> {
        let plan = DiffPlan::parse(&payload(ctx.envelope).diff)?;
        logs.push(format!(
            "applying approved diff covering {} file(s)",
            plan.affected_files().len()
        ));
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn plan_diff() -> String {
        DiffPlan::with_changes(vec![FileChange::Modify {
            path: "src/lib.rs".to_string(),
            before: "old\n".to_string(),
            after: "new\n".to_string(),
        }])
        .render()
    }

    fn envelope(targets: serde_json::Value, diff: String) -> ArtifactEnvelope {
        ArtifactEnvelope::new_draft(
            ArtifactKind::ImplementationPlan,
            json!({"targets": targets, "diff": diff, "language": "rust"}),
            BTreeSet::new(),
        )
    }

    fn repo_with_lib() -> tempfile::TempDir {
        let repo = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(repo.path().join("src")).unwrap();
        std::fs::write(repo.path().join("src/lib.rs"), "old\n").unwrap();
        repo
    }

    #[test]
    fn authorized_target_passes_preconditions() {
        let repo = repo_with_lib();
        let envelope = envelope(json!(["src/lib.rs"]), plan_diff());
        let ctx = ExecutorContext {
            repo_root: repo.path(),
            envelope: &envelope,
            protected_paths: &[],
        };
        DiffApplyExecutor::new().check_preconditions(&ctx).unwrap();
    }

    #[test]
    fn unauthorized_file_is_rejected() {
        let repo = repo_with_lib();
        // Diff touches src/lib.rs but the plan only authorizes src/other.rs.
        let envelope = envelope(json!(["src/other.rs"]), plan_diff());
        let ctx = ExecutorContext {
            repo_root: repo.path(),
            envelope: &envelope,
            protected_paths: &[],
        };

        let result = DiffApplyExecutor::new().check_preconditions(&ctx);
        assert!(matches!(
            result,
            Err(ExecutorError::Precondition(PreconditionError::TargetNotAuthorized { .. }))
        ));
    }

    #[test]
    fn protected_test_path_is_rejected() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(repo.path().join("tests")).unwrap();
        std::fs::write(repo.path().join("tests/api.rs"), "old\n").unwrap();

        let diff = DiffPlan::with_changes(vec![FileChange::Modify {
            path: "tests/api.rs".to_string(),
            before: "old\n".to_string(),
            after: "new\n".to_string(),
        }])
        .render();
        let envelope = envelope(json!(["tests/api.rs"]), diff);
        let protected = vec!["tests".to_string()];
        let ctx = ExecutorContext {
            repo_root: repo.path(),
            envelope: &envelope,
            protected_paths: &protected,
        };

        let result = DiffApplyExecutor::new().check_preconditions(&ctx);
        assert!(matches!(
            result,
            Err(ExecutorError::Precondition(PreconditionError::ProtectedPathModified { .. }))
        ));
    }

    #[test]
    fn missing_modify_target_is_rejected() {
        let repo = tempfile::tempdir().unwrap();
        let envelope = envelope(json!(["src/lib.rs"]), plan_diff());
        let ctx = ExecutorContext {
            repo_root: repo.path(),
            envelope: &envelope,
            protected_paths: &[],
        };

        let result = DiffApplyExecutor::new().check_preconditions(&ctx);
        assert!(matches!(
            result,
            Err(ExecutorError::Precondition(PreconditionError::NotFound { .. }))
        ));
    }

    #[test]
    fn malformed_diff_is_rejected() {
        let repo = repo_with_lib();
        let envelope = envelope(json!(["src/lib.rs"]), "not a diff".to_string());
        let ctx = ExecutorContext {
            repo_root: repo.path(),
            envelope: &envelope,
            protected_paths: &[],
        };

        let result = DiffApplyExecutor::new().check_preconditions(&ctx);
        assert!(matches!(result, Err(ExecutorError::Plan(_))));
    }
}
