//! The fixed nine-step execution sequence
//!
//! [`ExecutorEngine`] owns the ports (store, approval book, capability
//! registry, ledger, diff archive) and drives any [`ExecutorVariant`]
//! through the same strictly ordered pipeline with early return on the
//! first failing step. Variants only contribute their name, requested
//! operations, preconditions and diff construction; the shared order and
//! fail-fast discipline is the contract, not a plugin system.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use pge_artifact::{
    validate_payload, ApprovalBook, ArtifactEnvelope, ArtifactId, ArtifactKind, ArtifactStatus,
    ArtifactStore,
};
use pge_capability::{CapabilityRegistry, Language, MechanicalOperation};
use pge_ledger::{
    DiffArchive, DiffRef, ExecutionMode, ExecutionStatus, Ledger, NewAuditEntry, SavedDiff,
};

use crate::apply;
use crate::diff::DiffPlan;
use crate::error::{CapabilityFailure, ExecutorError, PlanFailure, PreconditionError};

/// Outcome of one executor invocation
///
/// Produced exactly once per invocation and never partially populated:
/// on failure no diff is left in an ambiguous half-applied state.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub diffs: Vec<DiffRef>,
    pub errors: Vec<String>,
    pub logs: Vec<String>,
}

impl ExecutionResult {
    /// True when the whole pipeline succeeded, ledger entry included
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Read-only view handed to variant hooks
#[derive(Debug)]
pub struct ExecutorContext<'a> {
    pub repo_root: &'a Path,
    pub envelope: &'a ArtifactEnvelope,
    /// Repo-relative prefixes protected by currently locked TestPlans
    pub protected_paths: &'a [String],
}

/// Variant-specific hooks of the nine-step contract
pub trait ExecutorVariant {
    /// Executor name, recorded in ledger entries and diff file names
    fn name(&self) -> &'static str;

    /// The single artifact kind this variant accepts
    fn expected_kind(&self) -> ArtifactKind;

    /// Repo-relative files the plan declares, used for language detection
    fn declared_files(&self, envelope: &ArtifactEnvelope) -> Vec<String>;

    /// Mechanical operations the plan requests, checked against the
    /// capability registry before any mutation
    fn requested_operations(&self, envelope: &ArtifactEnvelope) -> Vec<MechanicalOperation>;

    /// Step 5: variant preconditions; must not mutate the repository
    fn check_preconditions(&self, ctx: &ExecutorContext<'_>) -> Result<(), ExecutorError>;

    /// Step 6: compute the diff; must not mutate the repository
    fn build_diff(
        &self,
        ctx: &ExecutorContext<'_>,
        logs: &mut Vec<String>,
    ) -> Result<DiffPlan, ExecutorError>;
}

/// Drives executor variants through the nine-step sequence
///
/// Stateless between invocations: every precondition is re-derived from
/// disk on each call.
pub struct ExecutorEngine<S> {
    store: S,
    book: ApprovalBook,
    registry: CapabilityRegistry,
    ledger: Ledger,
    archive: DiffArchive,
    repo_root: PathBuf,
}

impl<S: ArtifactStore> ExecutorEngine<S> {
    /// Build over explicit ports; constructed once at process start
    #[must_use]
    pub fn new(
        store: S,
        book: ApprovalBook,
        registry: CapabilityRegistry,
        ledger: Ledger,
        archive: DiffArchive,
        repo_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            book,
            registry,
            ledger,
            archive,
            repo_root: repo_root.into(),
        }
    }

    /// Repository root every declared path must resolve inside
    #[inline]
    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// The underlying artifact store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one artifact through the nine-step sequence
    ///
    /// Always appends exactly one ledger entry, success or failure; if
    /// that append fails, the execution is reported as failed even when
    /// steps 1-7 succeeded.
    pub fn execute(
        &self,
        variant: &dyn ExecutorVariant,
        artifact_id: &ArtifactId,
        mode: ExecutionMode,
    ) -> ExecutionResult {
        let start = Instant::now();
        let mut logs = Vec::new();
        let mut saved: Option<SavedDiff> = None;
        let mut affected: Vec<String> = Vec::new();

        tracing::info!(
            executor = variant.name(),
            artifact = %artifact_id,
            mode = mode.as_str(),
            "executing"
        );

        let outcome =
            self.run_steps(variant, artifact_id, mode, &mut logs, &mut saved, &mut affected);

        let mut errors = Vec::new();
        let status = match &outcome {
            Ok(()) => ExecutionStatus::Success,
            Err(e) => {
                tracing::warn!(executor = variant.name(), code = e.code(), error = %e, "execution failed");
                errors.push(format!("{}: {e}; remediation: {}", e.code(), e.remediation()));
                ExecutionStatus::Failure
            }
        };

        let entry = NewAuditEntry {
            executor: variant.name().to_string(),
            artifact_id: artifact_id.clone(),
            status,
            mode,
            diff_ref: saved.as_ref().map(|s| s.reference.as_str().to_string()),
            diff_hash: saved.as_ref().map(|s| s.hash),
            affected_files: affected,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            error: errors.first().cloned(),
        };

        // Step 8 is mandatory: an execution with no ledger entry is
        // invalid even if everything before it succeeded.
        let status = match self.ledger.append(entry) {
            Ok(_) => status,
            Err(e) => {
                let wrapped = ExecutorError::from(e);
                errors.push(format!(
                    "{}: {wrapped}; remediation: {}",
                    wrapped.code(),
                    wrapped.remediation()
                ));
                ExecutionStatus::Failure
            }
        };

        ExecutionResult {
            status,
            diffs: saved.map(|s| vec![s.reference]).unwrap_or_default(),
            errors,
            logs,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_steps(
        &self,
        variant: &dyn ExecutorVariant,
        artifact_id: &ArtifactId,
        mode: ExecutionMode,
        logs: &mut Vec<String>,
        saved: &mut Option<SavedDiff>,
        affected: &mut Vec<String>,
    ) -> Result<(), ExecutorError> {
        // 1. Load
        let envelope = self.store.load(artifact_id)?;
        if envelope.kind != variant.expected_kind() {
            return Err(PlanFailure::WrongKind {
                id: artifact_id.clone(),
                expected: variant.expected_kind(),
                actual: envelope.kind,
            }
            .into());
        }

        // 2. Schema
        validate_payload(envelope.kind, &envelope.payload).map_err(PlanFailure::SchemaInvalid)?;

        // 3. Approval cross-check. The envelope's own status field could
        // have been forged by editing the artifact file, so an
        // independently appended approval record must exist and match.
        let status_ok = envelope.status == ArtifactStatus::Approved
            || (envelope.status == ArtifactStatus::Locked && envelope.kind.is_lockable());
        if !status_ok {
            return Err(PreconditionError::NotApproved {
                id: artifact_id.clone(),
                reason: format!("status is {}", envelope.status),
            }
            .into());
        }
        let approval = self.book.find_approval(artifact_id)?.ok_or_else(|| {
            PreconditionError::NotApproved {
                id: artifact_id.clone(),
                reason: "no independent approval record".to_string(),
            }
        })?;
        if approval.payload_hash != envelope.payload_hash() {
            return Err(PreconditionError::NotApproved {
                id: artifact_id.clone(),
                reason: "payload changed since approval".to_string(),
            }
            .into());
        }

        // 4. Capability
        let operations = variant.requested_operations(&envelope);
        let language = self.detect_language(variant, &envelope)?;
        if let Some(first) = self.registry.unsupported(&operations, language).first() {
            return Err(CapabilityFailure::UnsupportedOperation {
                operation: *first,
                language,
            }
            .into());
        }

        // 5. Variant preconditions
        let protected = self.protected_paths()?;
        let ctx = ExecutorContext {
            repo_root: &self.repo_root,
            envelope: &envelope,
            protected_paths: &protected,
        };
        variant.check_preconditions(&ctx)?;

        // 6. Compute the diff and archive it regardless of mode
        let plan = variant.build_diff(&ctx, logs)?;
        *affected = plan.affected_files();
        *saved = Some(self.archive.save_diff(&plan.render(), variant.name())?);

        // 7. Apply atomically
        if mode == ExecutionMode::Apply {
            apply::apply(&plan, &self.repo_root)?;
            logs.push(format!("applied {} change(s)", plan.changes.len()));
        }
        Ok(())
    }

    /// Language from the payload's `language` field, else from the first
    /// declared file with a recognizable extension; fail-closed otherwise
    fn detect_language(
        &self,
        variant: &dyn ExecutorVariant,
        envelope: &ArtifactEnvelope,
    ) -> Result<Language, ExecutorError> {
        if let Some(name) = envelope.payload.get("language").and_then(|v| v.as_str()) {
            return name.parse().map_err(|_| {
                CapabilityFailure::LanguageUndetected {
                    hint: format!("unknown language: {name}"),
                }
                .into()
            });
        }
        variant
            .declared_files(envelope)
            .iter()
            .find_map(|file| Language::from_path(Path::new(file)))
            .ok_or_else(|| {
                CapabilityFailure::LanguageUndetected {
                    hint: "no language field and no recognizable file extension".to_string(),
                }
                .into()
            })
    }

    /// Protected prefixes declared by currently locked TestPlans
    ///
    /// A lock record in the book protects even when the envelope's own
    /// status was forged back to an earlier state.
    fn protected_paths(&self) -> Result<Vec<String>, ExecutorError> {
        let locked_ids: BTreeSet<ArtifactId> = self
            .book
            .locks()?
            .into_iter()
            .map(|l| l.artifact_id)
            .collect();

        let mut paths = Vec::new();
        for envelope in self.store.list_by_kind(ArtifactKind::TestPlan)? {
            let locked =
                envelope.status == ArtifactStatus::Locked || locked_ids.contains(&envelope.id);
            if !locked {
                continue;
            }
            if let Some(list) = envelope.payload.get("protected_paths").and_then(|v| v.as_array())
            {
                paths.extend(list.iter().filter_map(|v| v.as_str().map(String::from)));
            }
        }
        Ok(paths)
    }
}
