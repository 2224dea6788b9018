//! Mechanical refactor executor
//!
//! Two operations: `move_file` relocates a file without touching its
//! content, `rename_symbol` is a textual substitution scoped to the
//! declared file. Symbol reference rewriting beyond the textual match is
//! out of scope.

use std::fs;

use serde::Deserialize;

use pge_artifact::{ArtifactEnvelope, ArtifactKind};
use pge_capability::MechanicalOperation;

use crate::diff::{DiffPlan, FileChange};
use crate::engine::{ExecutorContext, ExecutorVariant};
use crate::error::{ExecutorError, PreconditionError};
use crate::paths::resolve_in_root;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum RefactorOperation {
    MoveFile { from: String, to: String },
    RenameSymbol {
        file: String,
        from: String,
        to: String,
    },
}

#[derive(Debug, Deserialize)]
struct RefactorPayload {
    operations: Vec<RefactorOperation>,
}

fn payload(envelope: &ArtifactEnvelope) -> RefactorPayload {
    // Schema validation ran in step 2, so the shape is guaranteed here.
    serde_json::from_value(envelope.payload.clone()).unwrap_or(RefactorPayload {
        operations: Vec::new(),
    })
}

/// Refactor variant of the nine-step contract
#[derive(Debug, Default)]
pub struct RefactorExecutor;

impl RefactorExecutor {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExecutorVariant for RefactorExecutor {
    fn name(&self) -> &'static str {
        "refactor"
    }

    fn expected_kind(&self) -> ArtifactKind {
        ArtifactKind::RefactorPlan
    }

    fn declared_files(&self, envelope: &ArtifactEnvelope) -> Vec<String> {
        payload(envelope)
            .operations
            .iter()
            .map(|op| match op {
                RefactorOperation::MoveFile { from, .. } => from.clone(),
                RefactorOperation::RenameSymbol { file, .. } => file.clone(),
            })
            .collect()
    }

    fn requested_operations(&self, envelope: &ArtifactEnvelope) -> Vec<MechanicalOperation> {
        payload(envelope)
            .operations
            .iter()
            .map(|op| match op {
                RefactorOperation::MoveFile { .. } => MechanicalOperation::MoveFile,
                RefactorOperation::RenameSymbol { .. } => MechanicalOperation::RenameSymbol,
            })
            .collect()
    }

    fn check_preconditions(&self, ctx: &ExecutorContext<'_>) -> Result<(), ExecutorError> {
        for op in payload(ctx.envelope).operations {
            match op {
                RefactorOperation::MoveFile { from, to } => {
                    if !resolve_in_root(ctx.repo_root, &from)?.exists() {
                        return Err(PreconditionError::NotFound { path: from }.into());
                    }
                    if resolve_in_root(ctx.repo_root, &to)?.exists() {
                        return Err(PreconditionError::AlreadyExists { path: to }.into());
                    }
                }
                RefactorOperation::RenameSymbol { file, .. } => {
                    if !resolve_in_root(ctx.repo_root, &file)?.exists() {
                        return Err(PreconditionError::NotFound { path: file }.into());
                    }
                }
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
        for op in payload(ctx.envelope).operations {
            match op {
                RefactorOperation::MoveFile { from, to } => {
                    changes.push(FileChange::Move { from, to });
                }
                RefactorOperation::RenameSymbol { file, from, to } => {
                    let resolved = resolve_in_root(ctx.repo_root, &file)?;
                    let before = fs::read_to_string(&resolved).map_err(|_| {
                        PreconditionError::NotFound { path: file.clone() }
                    })?;
                    let after = before.replace(&from, &to);
                    if after == before {
                        logs.push(format!("no occurrences of '{from}' in {file}"));
                        continue;
                    }
                    changes.push(FileChange::Modify {
                        path: file,
                        before,
                        after,
                    });
                }
            }
        }
        Ok(DiffPlan::with_changes(changes))
    }
}
