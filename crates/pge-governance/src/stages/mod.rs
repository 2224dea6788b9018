//! The five stage validators
//!
//! Each stage is independently invocable and returns its failures; the
//! orchestrator wraps them with timing and ordering. Stages only read:
//! repository state, artifact store, approval book and ledger are
//! re-derived on every run.

mod approval_verification;
mod artifact_validation;
mod audit_verification;
mod invariant;
mod test_execution;

pub use approval_verification::ApprovalVerificationStage;
pub use artifact_validation::ArtifactValidationStage;
pub use audit_verification::AuditVerificationStage;
pub use invariant::InvariantStage;
pub use test_execution::TestExecutionStage;

use pge_artifact::{ApprovalBook, ArtifactKind, ArtifactStatus, ArtifactStore};
use pge_ledger::{DiffArchive, Ledger};

use crate::runner::TestRunner;
use crate::types::CiFailure;
use crate::vcs::VcsQuery;

/// Read-only ports and configuration handed to every stage
pub struct GovernanceContext<'a> {
    pub store: &'a dyn ArtifactStore,
    pub book: &'a ApprovalBook,
    pub ledger: &'a Ledger,
    pub archive: &'a DiffArchive,
    pub vcs: &'a dyn VcsQuery,
    pub runner: &'a dyn TestRunner,
    /// Reference point for changed-file queries
    pub base_ref: &'a str,
    /// Repo-relative prefixes holding governance metadata (artifact
    /// store, ledger, archive, approvals); never treated as source
    pub governed_paths: &'a [String],
}

/// One governance stage validator
pub trait CiStage {
    /// Stable stage name used in the result document
    fn name(&self) -> &'static str;

    /// Run the stage, returning every failure found
    fn run(&self, ctx: &GovernanceContext<'_>) -> Vec<CiFailure>;
}

/// True when `path` equals or sits under the repo-relative prefix
pub(crate) fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

/// Protected prefixes declared by currently locked TestPlans
///
/// A lock record in the book protects even when the envelope's own
/// status was forged back to an earlier state.
pub(crate) fn protected_paths(ctx: &GovernanceContext<'_>) -> Result<Vec<String>, CiFailure> {
    use crate::types::CiFailureCode;

    let locked_ids: std::collections::BTreeSet<_> = ctx
        .book
        .locks()
        .map_err(|e| CiFailure::new(CiFailureCode::StoreUnreadable, e.to_string()))?
        .into_iter()
        .map(|l| l.artifact_id)
        .collect();

    let envelopes = ctx
        .store
        .list_by_kind(ArtifactKind::TestPlan)
        .map_err(|e| CiFailure::new(CiFailureCode::StoreUnreadable, e.to_string()))?;

    let mut paths = Vec::new();
    for envelope in envelopes {
        let locked =
            envelope.status == ArtifactStatus::Locked || locked_ids.contains(&envelope.id);
        if !locked {
            continue;
        }
        if let Some(list) = envelope.payload.get("protected_paths").and_then(|v| v.as_array()) {
            paths.extend(list.iter().filter_map(|v| v.as_str().map(String::from)));
        }
    }
    Ok(paths)
}
