//! Testing utilities for the PGE workspace
//!
//! Shared fixtures: schema-valid sample payloads per artifact kind and a
//! temp directory layout with the governed files (approval book, ledger,
//! diff archive, repo root) wired the way production lays them out.

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::path::PathBuf;

use pge_artifact::{ApprovalBook, ArtifactEnvelope, ArtifactKind};

/// A payload that satisfies the kind's bundled schema
#[must_use]
pub fn sample_payload(kind: ArtifactKind) -> serde_json::Value {
    match kind {
        ArtifactKind::ProjectPlan => serde_json::json!({"name": "sample project"}),
        ArtifactKind::ScaffoldPlan => {
            serde_json::json!({"files": ["src/sample.rs"], "language": "rust"})
        }
        ArtifactKind::TestPlan => serde_json::json!({"protected_paths": ["tests"]}),
        ArtifactKind::ImplementationPlan => serde_json::json!({
            "targets": ["src/sample.rs"],
            "diff": "{\"changes\": []}",
            "language": "rust"
        }),
        ArtifactKind::RefactorPlan => serde_json::json!({
            "operations": [
                {"op": "rename_symbol", "file": "src/sample.rs", "from": "a", "to": "b"}
            ],
            "language": "rust"
        }),
        ArtifactKind::ValidationResult => serde_json::json!({"passed": true}),
    }
}

/// A DRAFT envelope with a schema-valid payload and no dependencies
#[must_use]
pub fn draft_envelope(kind: ArtifactKind) -> ArtifactEnvelope {
    ArtifactEnvelope::new_draft(kind, sample_payload(kind), BTreeSet::new())
}

/// Temp directory with the governed file layout
pub struct GovernedTemp {
    pub dir: tempfile::TempDir,
    pub repo_root: PathBuf,
    pub ledger_path: PathBuf,
    pub diffs_dir: PathBuf,
    pub book: ApprovalBook,
}

/// Create a fresh governed temp layout with an empty `repo/src`
#[must_use]
pub fn governed_temp() -> GovernedTemp {
    let dir = tempfile::tempdir().expect("create temp dir");
    let repo_root = dir.path().join("repo");
    std::fs::create_dir_all(repo_root.join("src")).expect("create repo dirs");

    GovernedTemp {
        repo_root,
        ledger_path: dir.path().join("ledger.jsonl"),
        diffs_dir: dir.path().join("diffs"),
        book: ApprovalBook::new(dir.path().join("approvals.jsonl")),
        dir,
    }
}
