//! Stage 1: artifact validation
//!
//! Scans every artifact: schema violations, artifacts still in DRAFT and
//! locked artifacts whose persisted payload no longer matches the hash
//! pinned by their lock record are all failures.

use pge_artifact::{validate_payload, ArtifactStatus};

use crate::stages::{CiStage, GovernanceContext};
use crate::types::{CiFailure, CiFailureCode};

#[derive(Debug, Default)]
pub struct ArtifactValidationStage;

impl CiStage for ArtifactValidationStage {
    fn name(&self) -> &'static str {
        "artifact_validation"
    }

    fn run(&self, ctx: &GovernanceContext<'_>) -> Vec<CiFailure> {
        let envelopes = match ctx.store.list_all() {
            Ok(envelopes) => envelopes,
            Err(e) => {
                return vec![CiFailure::new(CiFailureCode::StoreUnreadable, e.to_string())]
            }
        };

        let mut failures = Vec::new();
        for envelope in envelopes {
            if let Err(e) = validate_payload(envelope.kind, &envelope.payload) {
                failures.push(
                    CiFailure::new(CiFailureCode::SchemaViolation, e.to_string())
                        .with_file(envelope.id.as_str()),
                );
            }

            match envelope.status {
                ArtifactStatus::Draft => {
                    failures.push(
                        CiFailure::new(
                            CiFailureCode::DraftArtifactPresent,
                            format!("artifact {} is still DRAFT", envelope.id),
                        )
                        .with_file(envelope.id.as_str()),
                    );
                }
                ArtifactStatus::Locked => match ctx.book.find_lock(&envelope.id) {
                    Ok(Some(lock)) if lock.payload_hash == envelope.payload_hash() => {}
                    Ok(Some(_)) => {
                        failures.push(
                            CiFailure::new(
                                CiFailureCode::LockedArtifactModified,
                                format!(
                                    "locked artifact {} no longer matches its pinned payload hash",
                                    envelope.id
                                ),
                            )
                            .with_file(envelope.id.as_str()),
                        );
                    }
                    Ok(None) => {
                        failures.push(
                            CiFailure::new(
                                CiFailureCode::LockedArtifactModified,
                                format!("locked artifact {} has no lock record", envelope.id),
                            )
                            .with_file(envelope.id.as_str()),
                        );
                    }
                    Err(e) => {
                        failures
                            .push(CiFailure::new(CiFailureCode::StoreUnreadable, e.to_string()));
                    }
                },
                ArtifactStatus::Approved => {}
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
        ApprovalBook, ArtifactEnvelope, ArtifactKind, ArtifactLifecycle, ArtifactStore,
        MemoryArtifactStore,
    };
    use pge_ledger::{DiffArchive, Ledger};
    use serde_json::json;
    use std::collections::BTreeSet;

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

    fn run_stage(f: &Fixture) -> Vec<CiFailure> {
        let ledger = Ledger::new(f.dir.path().join("ledger.jsonl"));
        let archive = DiffArchive::open(f.dir.path().join("diffs")).unwrap();
        let vcs = StaticVcs::default();
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
        ArtifactValidationStage.run(&ctx)
    }

    #[test]
    fn clean_approved_artifacts_pass() {
        let f = fixture();
        let lifecycle = ArtifactLifecycle::new(MemoryArtifactStore::new(), f.book.clone());
        let envelope = lifecycle
            .create(ArtifactKind::ProjectPlan, json!({"name": "demo"}), BTreeSet::new())
            .unwrap();
        let approved = lifecycle.approve(&envelope.id, "reviewer").unwrap();
        f.store.save(&approved).unwrap();

        assert!(run_stage(&f).is_empty());
    }

    #[test]
    fn draft_artifact_is_reported() {
        let f = fixture();
        let envelope = ArtifactEnvelope::new_draft(
            ArtifactKind::ProjectPlan,
            json!({"name": "demo"}),
            BTreeSet::new(),
        );
        f.store.save(&envelope).unwrap();

        let failures = run_stage(&f);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, CiFailureCode::DraftArtifactPresent);
    }

    #[test]
    fn tampered_locked_payload_is_reported() {
        let f = fixture();
        let lifecycle = ArtifactLifecycle::new(MemoryArtifactStore::new(), f.book.clone());
        let envelope = lifecycle
            .create(
                ArtifactKind::TestPlan,
                json!({"protected_paths": ["tests/"]}),
                BTreeSet::new(),
            )
            .unwrap();
        lifecycle.approve(&envelope.id, "reviewer").unwrap();
        let mut locked = lifecycle.lock(&envelope.id).unwrap();

        // Out-of-band payload mutation after locking.
        locked.payload = json!({"protected_paths": ["nothing/"]});
        f.store.save(&locked).unwrap();

        let failures = run_stage(&f);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, CiFailureCode::LockedArtifactModified);
    }

    #[test]
    fn schema_violation_is_reported_per_artifact() {
        let f = fixture();
        let mut envelope = ArtifactEnvelope::new_draft(
            ArtifactKind::ScaffoldPlan,
            json!({"files": ["src/a.rs"]}),
            BTreeSet::new(),
        );
        envelope.status = ArtifactStatus::Approved;
        envelope.payload = json!({"wrong": true});
        f.store.save(&envelope).unwrap();

        let failures = run_stage(&f);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, CiFailureCode::SchemaViolation);
        assert_eq!(failures[0].file_path.as_deref(), Some(envelope.id.as_str()));
    }
}
