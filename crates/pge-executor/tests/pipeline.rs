//! End-to-end nine-step pipeline tests over real temp directories

use std::collections::BTreeSet;

use serde_json::json;

use pge_artifact::{
    ArtifactId, ArtifactKind, ArtifactLifecycle, ArtifactStore, MemoryArtifactStore,
};
use pge_capability::CapabilityRegistry;
use pge_executor::{
    DiffApplyExecutor, DiffPlan, ExecutionMode, ExecutorEngine, FileChange, RefactorExecutor,
    ScaffoldExecutor, SCAFFOLD_MARKER,
};
use pge_ledger::{DiffArchive, ExecutionStatus, Ledger};

struct Harness {
    temp: pge_test_utils::GovernedTemp,
    repo: std::path::PathBuf,
    lifecycle: ArtifactLifecycle<MemoryArtifactStore>,
    engine: ExecutorEngine<MemoryArtifactStore>,
    ledger_path: std::path::PathBuf,
}

fn harness() -> Harness {
    let temp = pge_test_utils::governed_temp();
    let repo = temp.repo_root.clone();
    let ledger_path = temp.ledger_path.clone();

    // Lifecycle and engine each own a store instance; envelopes are
    // copied across after lifecycle operations, mirroring two processes
    // that share one artifact directory.
    let lifecycle = ArtifactLifecycle::new(MemoryArtifactStore::new(), temp.book.clone());
    let engine = ExecutorEngine::new(
        MemoryArtifactStore::new(),
        temp.book.clone(),
        CapabilityRegistry::bundled(),
        Ledger::new(&ledger_path),
        DiffArchive::open(&temp.diffs_dir).unwrap(),
        &repo,
    );

    Harness {
        temp,
        repo,
        lifecycle,
        engine,
        ledger_path,
    }
}

/// Create + approve a plan through the lifecycle, then copy the envelope
/// into the engine's store (simulating both components reading the same
/// artifact directory).
fn approved_plan(
    h: &Harness,
    kind: ArtifactKind,
    payload: serde_json::Value,
) -> ArtifactId {
    let envelope = h.lifecycle.create(kind, payload, BTreeSet::new()).unwrap();
    let approved = h.lifecycle.approve(&envelope.id, "reviewer").unwrap();
    h.engine_store_save(&approved);
    approved.id
}

impl Harness {
    fn engine_store_save(&self, envelope: &pge_artifact::ArtifactEnvelope) {
        self.engine.store().save(envelope).unwrap();
    }
}

#[test]
fn dry_run_never_mutates_but_always_logs() {
    let h = harness();
    let id = approved_plan(
        &h,
        ArtifactKind::ScaffoldPlan,
        json!({"files": ["src/new_module.rs"], "language": "rust"}),
    );

    let result = h
        .engine
        .execute(&ScaffoldExecutor::new(), &id, ExecutionMode::DryRun);

    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.diffs.len(), 1);
    // Repository untouched
    assert!(!h.repo.join("src/new_module.rs").exists());
    // Exactly one ledger entry
    let ledger = Ledger::new(&h.ledger_path);
    assert_eq!(ledger.read_all().unwrap().len(), 1);
}

#[test]
fn apply_scaffold_creates_placeholder_files() {
    let h = harness();
    let id = approved_plan(
        &h,
        ArtifactKind::ScaffoldPlan,
        json!({"files": ["src/new_module.rs"], "language": "rust"}),
    );

    let result = h
        .engine
        .execute(&ScaffoldExecutor::new(), &id, ExecutionMode::Apply);

    assert!(result.succeeded(), "errors: {:?}", result.errors);
    let content = std::fs::read_to_string(h.repo.join("src/new_module.rs")).unwrap();
    assert_eq!(content, SCAFFOLD_MARKER);
}

#[test]
fn unapproved_artifact_is_refused_and_still_logged() {
    let h = harness();
    let envelope = h
        .lifecycle
        .create(
            ArtifactKind::ScaffoldPlan,
            json!({"files": ["src/x.rs"], "language": "rust"}),
            BTreeSet::new(),
        )
        .unwrap();
    h.engine_store_save(&envelope);

    let result = h
        .engine
        .execute(&ScaffoldExecutor::new(), &envelope.id, ExecutionMode::Apply);

    assert_eq!(result.status, ExecutionStatus::Failure);
    assert!(result.errors[0].contains("NOT_APPROVED"));
    assert!(!h.repo.join("src/x.rs").exists());
    // Failure is logged too: an execution with no entry is invalid.
    let ledger = Ledger::new(&h.ledger_path);
    let entries = ledger.read_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, ExecutionStatus::Failure);
}

#[test]
fn forged_status_without_approval_record_is_refused() {
    let h = harness();
    let mut envelope = h
        .lifecycle
        .create(
            ArtifactKind::ScaffoldPlan,
            json!({"files": ["src/x.rs"], "language": "rust"}),
            BTreeSet::new(),
        )
        .unwrap();
    // Forge the status field directly, bypassing the lifecycle (and
    // therefore the approval book).
    envelope.status = pge_artifact::ArtifactStatus::Approved;
    h.engine_store_save(&envelope);

    let result = h
        .engine
        .execute(&ScaffoldExecutor::new(), &envelope.id, ExecutionMode::Apply);

    assert_eq!(result.status, ExecutionStatus::Failure);
    assert!(result.errors[0].contains("no independent approval record"));
}

#[test]
fn unsupported_operation_fails_before_any_mutation() {
    let h = harness();
    // move_file is only "partial" for go in the bundled registry.
    let id = approved_plan(
        &h,
        ArtifactKind::RefactorPlan,
        json!({
            "operations": [
                {"op": "move_file", "from": "pkg/a.go", "to": "pkg/b.go"}
            ],
            "language": "go"
        }),
    );
    std::fs::create_dir_all(h.repo.join("pkg")).unwrap();
    std::fs::write(h.repo.join("pkg/a.go"), "package pkg\n").unwrap();

    let result = h
        .engine
        .execute(&RefactorExecutor::new(), &id, ExecutionMode::Apply);

    assert_eq!(result.status, ExecutionStatus::Failure);
    assert!(result.errors[0].contains("UNSUPPORTED_OPERATION"));
    assert!(h.repo.join("pkg/a.go").exists());
    assert!(!h.repo.join("pkg/b.go").exists());
}

#[test]
fn diff_apply_changes_exactly_the_listed_files() {
    let h = harness();
    std::fs::write(h.repo.join("src/lib.rs"), "fn a() {}\n").unwrap();

    let diff = DiffPlan::with_changes(vec![FileChange::Modify {
        path: "src/lib.rs".to_string(),
        before: "fn a() {}\n".to_string(),
        after: "fn a() {}\nfn b() {}\n".to_string(),
    }])
    .render();
    let id = approved_plan(
        &h,
        ArtifactKind::ImplementationPlan,
        json!({"targets": ["src/lib.rs"], "diff": diff, "language": "rust"}),
    );

    let result = h
        .engine
        .execute(&DiffApplyExecutor::new(), &id, ExecutionMode::Apply);

    assert!(result.succeeded(), "errors: {:?}", result.errors);
    assert_eq!(
        std::fs::read_to_string(h.repo.join("src/lib.rs")).unwrap(),
        "fn a() {}\nfn b() {}\n"
    );
}

#[test]
fn drifted_repository_leaves_no_partial_apply() {
    let h = harness();
    std::fs::write(h.repo.join("src/lib.rs"), "drifted content\n").unwrap();
    std::fs::write(h.repo.join("src/other.rs"), "fn o() {}\n").unwrap();

    // Two-file diff where the second file no longer matches `before`.
    let diff = DiffPlan::with_changes(vec![
        FileChange::Modify {
            path: "src/other.rs".to_string(),
            before: "fn o() {}\n".to_string(),
            after: "fn o() { /* changed */ }\n".to_string(),
        },
        FileChange::Modify {
            path: "src/lib.rs".to_string(),
            before: "expected content\n".to_string(),
            after: "new content\n".to_string(),
        },
    ])
    .render();
    let id = approved_plan(
        &h,
        ArtifactKind::ImplementationPlan,
        json!({"targets": ["src/other.rs", "src/lib.rs"], "diff": diff, "language": "rust"}),
    );

    let result = h
        .engine
        .execute(&DiffApplyExecutor::new(), &id, ExecutionMode::Apply);

    assert_eq!(result.status, ExecutionStatus::Failure);
    // Neither file changed: no partial-file-set outcome is observable.
    assert_eq!(
        std::fs::read_to_string(h.repo.join("src/other.rs")).unwrap(),
        "fn o() {}\n"
    );
    assert_eq!(
        std::fs::read_to_string(h.repo.join("src/lib.rs")).unwrap(),
        "drifted content\n"
    );
}

#[test]
fn locked_test_plan_blocks_diff_apply_on_protected_paths() {
    let h = harness();
    std::fs::create_dir_all(h.repo.join("tests")).unwrap();
    std::fs::write(h.repo.join("tests/api.rs"), "#[test] fn t() {}\n").unwrap();

    // Lock a TestPlan protecting tests/.
    let test_plan = h
        .lifecycle
        .create(
            ArtifactKind::TestPlan,
            json!({"protected_paths": ["tests"]}),
            BTreeSet::new(),
        )
        .unwrap();
    h.lifecycle.approve(&test_plan.id, "reviewer").unwrap();
    let locked = h.lifecycle.lock(&test_plan.id).unwrap();
    h.engine_store_save(&locked);

    let diff = DiffPlan::with_changes(vec![FileChange::Modify {
        path: "tests/api.rs".to_string(),
        before: "#[test] fn t() {}\n".to_string(),
        after: "#[test] fn t() { assert!(true); }\n".to_string(),
    }])
    .render();
    let id = approved_plan(
        &h,
        ArtifactKind::ImplementationPlan,
        json!({"targets": ["tests/api.rs"], "diff": diff, "language": "rust"}),
    );

    let result = h
        .engine
        .execute(&DiffApplyExecutor::new(), &id, ExecutionMode::Apply);

    assert_eq!(result.status, ExecutionStatus::Failure);
    assert!(result.errors[0].contains("PROTECTED_PATH_MODIFIED"));
    assert_eq!(
        std::fs::read_to_string(h.repo.join("tests/api.rs")).unwrap(),
        "#[test] fn t() {}\n"
    );
}

#[test]
fn refactor_move_and_rename_apply() {
    let h = harness();
    std::fs::write(h.repo.join("src/util.rs"), "fn helper() {}\n").unwrap();

    let id = approved_plan(
        &h,
        ArtifactKind::RefactorPlan,
        json!({
            "operations": [
                {"op": "rename_symbol", "file": "src/util.rs", "from": "helper", "to": "assist"},
                {"op": "move_file", "from": "src/util.rs", "to": "src/support.rs"}
            ],
            "language": "rust"
        }),
    );

    let result = h
        .engine
        .execute(&RefactorExecutor::new(), &id, ExecutionMode::Apply);

    assert!(result.succeeded(), "errors: {:?}", result.errors);
    assert!(!h.repo.join("src/util.rs").exists());
    assert_eq!(
        std::fs::read_to_string(h.repo.join("src/support.rs")).unwrap(),
        "fn assist() {}\n"
    );
}

#[test]
fn every_execution_references_a_verifiable_archived_diff() {
    let h = harness();
    let id = approved_plan(
        &h,
        ArtifactKind::ScaffoldPlan,
        json!({"files": ["src/gen.rs"], "language": "rust"}),
    );

    let result = h
        .engine
        .execute(&ScaffoldExecutor::new(), &id, ExecutionMode::DryRun);
    assert!(result.succeeded());

    let ledger = Ledger::new(&h.ledger_path);
    let entry = &ledger.read_for_artifact(&id).unwrap()[0];
    let diff_ref = pge_ledger::DiffRef::new(entry.diff_ref.clone().unwrap());
    let archive = DiffArchive::open(&h.temp.diffs_dir).unwrap();
    archive.verify(&diff_ref, entry.diff_hash.unwrap()).unwrap();
}
