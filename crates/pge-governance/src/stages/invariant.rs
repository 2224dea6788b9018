//! Stage 3: invariant enforcement
//!
//! (a) While a TestPlan is locked, no file under its protected paths may
//! appear in the changed-file set. (b) Every changed source file must be
//! covered by the union of file targets declared by approved
//! ImplementationPlan and RefactorPlan artifacts; anything else is an
//! unplanned change.

use std::collections::BTreeSet;

use pge_artifact::{ArtifactEnvelope, ArtifactKind, ArtifactStatus};

use crate::stages::{is_under, protected_paths, CiStage, GovernanceContext};
use crate::types::{CiFailure, CiFailureCode};

#[derive(Debug, Default)]
pub struct InvariantStage;

/// File targets an approved plan declares
fn declared_targets(envelope: &ArtifactEnvelope) -> Vec<String> {
    match envelope.kind {
        ArtifactKind::ImplementationPlan => envelope
            .payload
            .get("targets")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
        ArtifactKind::RefactorPlan => envelope
            .payload
            .get("operations")
            .and_then(|v| v.as_array())
            .map(|ops| {
                ops.iter()
                    .flat_map(|op| {
                        ["file", "from", "to"]
                            .iter()
                            .filter_map(|key| op.get(key).and_then(|v| v.as_str()))
                            .map(String::from)
                            .collect::<Vec<_>>()
                    })
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

impl CiStage for InvariantStage {
    fn name(&self) -> &'static str {
        "invariant_enforcement"
    }

    fn run(&self, ctx: &GovernanceContext<'_>) -> Vec<CiFailure> {
        let changed = match ctx.vcs.changed_files(ctx.base_ref) {
            Ok(changed) => changed,
            Err(e) => return vec![CiFailure::new(CiFailureCode::VcsQueryFailed, e.to_string())],
        };
        let protected = match protected_paths(ctx) {
            Ok(protected) => protected,
            Err(failure) => return vec![failure],
        };
        let envelopes = match ctx.store.list_all() {
            Ok(envelopes) => envelopes,
            Err(e) => {
                return vec![CiFailure::new(CiFailureCode::StoreUnreadable, e.to_string())]
            }
        };

        let planned: BTreeSet<String> = envelopes
            .iter()
            .filter(|e| {
                matches!(e.status, ArtifactStatus::Approved | ArtifactStatus::Locked)
            })
            .flat_map(declared_targets)
            .collect();

        let mut failures = Vec::new();
        for file in &changed {
            if ctx.governed_paths.iter().any(|p| is_under(file, p)) {
                continue;
            }
            if protected.iter().any(|p| is_under(file, p)) {
                failures.push(
                    CiFailure::new(
                        CiFailureCode::ProtectedTestModified,
                        format!("{file} changed while a test plan is locked"),
                    )
                    .with_file(file),
                );
                continue;
            }
            if !planned.contains(file) {
                failures.push(
                    CiFailure::new(
                        CiFailureCode::UnplannedCodeChange,
                        format!("{file} changed outside any approved plan's target set"),
                    )
                    .with_file(file),
                );
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::StaticTestRunner;
    use crate::vcs::StaticVcs;
    use pge_artifact::{
        ApprovalBook, ArtifactKind, ArtifactLifecycle, ArtifactStore, MemoryArtifactStore,
    };
    use pge_ledger::{DiffArchive, Ledger};
    use serde_json::json;
    use std::collections::BTreeSet as Set;

    struct Fixture {
        dir: tempfile::TempDir,
        store: MemoryArtifactStore,
        book: ApprovalBook,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let book = ApprovalBook::new(dir.path().join("approvals.jsonl"));
        Fixture {
            store: MemoryArtifactStore::new(),
            book,
            dir,
        }
    }

    fn run_stage(f: &Fixture, changed: &[&str]) -> Vec<CiFailure> {
        let ledger = Ledger::new(f.dir.path().join("ledger.jsonl"));
        let archive = DiffArchive::open(f.dir.path().join("diffs")).unwrap();
        let vcs = StaticVcs::with_files(changed.iter().copied());
        let runner = StaticTestRunner::passing();
        let governed = vec![".pge".to_string()];
        let ctx = GovernanceContext {
            store: &f.store,
            book: &f.book,
            ledger: &ledger,
            archive: &archive,
            vcs: &vcs,
            runner: &runner,
            base_ref: "HEAD",
            governed_paths: &governed,
        };
        InvariantStage.run(&ctx)
    }

    fn approved_impl_plan(f: &Fixture, targets: serde_json::Value) {
        let lifecycle = ArtifactLifecycle::new(MemoryArtifactStore::new(), f.book.clone());
        let envelope = lifecycle
            .create(
                ArtifactKind::ImplementationPlan,
                json!({"targets": targets, "diff": "{\"changes\": []}"}),
                Set::new(),
            )
            .unwrap();
        let approved = lifecycle.approve(&envelope.id, "reviewer").unwrap();
        f.store.save(&approved).unwrap();
    }

    #[test]
    fn planned_change_passes() {
        let f = fixture();
        approved_impl_plan(&f, json!(["src/lib.rs"]));
        assert!(run_stage(&f, &["src/lib.rs"]).is_empty());
    }

    #[test]
    fn unplanned_change_is_reported_with_path() {
        let f = fixture();
        approved_impl_plan(&f, json!(["src/lib.rs"]));

        let failures = run_stage(&f, &["src/lib.rs", "src/rogue.rs"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, CiFailureCode::UnplannedCodeChange);
        assert_eq!(failures[0].file_path.as_deref(), Some("src/rogue.rs"));
    }

    #[test]
    fn protected_test_change_is_reported_while_locked() {
        let f = fixture();
        let lifecycle = ArtifactLifecycle::new(MemoryArtifactStore::new(), f.book.clone());
        let plan = lifecycle
            .create(
                ArtifactKind::TestPlan,
                json!({"protected_paths": ["tests"]}),
                Set::new(),
            )
            .unwrap();
        lifecycle.approve(&plan.id, "reviewer").unwrap();
        let locked = lifecycle.lock(&plan.id).unwrap();
        f.store.save(&locked).unwrap();

        let failures = run_stage(&f, &["tests/api.rs"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, CiFailureCode::ProtectedTestModified);
    }

    #[test]
    fn governed_metadata_paths_are_ignored() {
        let f = fixture();
        assert!(run_stage(&f, &[".pge/ledger.jsonl"]).is_empty());
    }

    #[test]
    fn vcs_failure_surfaces_as_stage_failure() {
        let f = fixture();
        let ledger = Ledger::new(f.dir.path().join("ledger.jsonl"));
        let archive = DiffArchive::open(f.dir.path().join("diffs")).unwrap();
        let vcs = StaticVcs::failing("not a repository");
        let runner = StaticTestRunner::passing();
        let ctx = GovernanceContext {
            store: &f.store,
            book: &f.book,
            ledger: &ledger,
            archive: &archive,
            vcs: &vcs,
            runner: &runner,
            base_ref: "HEAD",
            governed_paths: &[],
        };

        let failures = InvariantStage.run(&ctx);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, CiFailureCode::VcsQueryFailed);
    }
}
