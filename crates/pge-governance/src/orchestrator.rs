//! Fixed-order stage orchestrator

use std::time::Instant;

use chrono::Utc;

use crate::stages::{
    ApprovalVerificationStage, ArtifactValidationStage, AuditVerificationStage, CiStage,
    GovernanceContext, InvariantStage, TestExecutionStage,
};
use crate::types::{CiResult, CiStageResult};

/// Runs the five stages in their fixed order
///
/// With `stop_on_failure` (the default) the pipeline halts after the
/// first failing stage and later stages are skipped; otherwise all
/// stages run and failures accumulate. The aggregate `passed` is true
/// only if every executed stage passed.
#[derive(Debug, Clone)]
pub struct GovernancePipeline {
    stop_on_failure: bool,
}

impl Default for GovernancePipeline {
    fn default() -> Self {
        Self {
            stop_on_failure: true,
        }
    }
}

impl GovernancePipeline {
    /// Pipeline that stops on the first failing stage
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every stage even after a failure
    #[inline]
    #[must_use]
    pub fn keep_going(mut self) -> Self {
        self.stop_on_failure = false;
        self
    }

    /// Run one stage with timing, independently invocable
    #[must_use]
    pub fn run_stage(stage: &dyn CiStage, ctx: &GovernanceContext<'_>) -> CiStageResult {
        let start = Instant::now();
        let failures = stage.run(ctx);
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = CiStageResult::new(stage.name(), failures, duration_ms);
        tracing::info!(
            stage = stage.name(),
            passed = result.passed,
            failures = result.failures.len(),
            "stage finished"
        );
        result
    }

    /// Run the full pipeline
    #[must_use]
    pub fn run(&self, ctx: &GovernanceContext<'_>) -> CiResult {
        let stages: [&dyn CiStage; 5] = [
            &ArtifactValidationStage,
            &ApprovalVerificationStage,
            &InvariantStage,
            &TestExecutionStage,
            &AuditVerificationStage,
        ];

        let start = Instant::now();
        let mut results = Vec::with_capacity(stages.len());
        for stage in stages {
            let result = Self::run_stage(stage, ctx);
            let failed = !result.passed;
            results.push(result);
            if failed && self.stop_on_failure {
                tracing::warn!(stage = stage.name(), "stage failed, later stages skipped");
                break;
            }
        }

        CiResult {
            passed: results.iter().all(|r| r.passed),
            stages: results,
            total_duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::StaticTestRunner;
    use crate::vcs::StaticVcs;
    use pge_artifact::{ApprovalBook, ArtifactEnvelope, ArtifactKind, ArtifactStore, MemoryArtifactStore};
    use pge_ledger::{DiffArchive, Ledger};
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn stop_on_failure_skips_later_stages() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryArtifactStore::new();
        // A draft artifact fails stage 1.
        store
            .save(&ArtifactEnvelope::new_draft(
                ArtifactKind::ProjectPlan,
                json!({"name": "demo"}),
                BTreeSet::new(),
            ))
            .unwrap();
        let book = ApprovalBook::new(dir.path().join("approvals.jsonl"));
        let ledger = Ledger::new(dir.path().join("ledger.jsonl"));
        let archive = DiffArchive::open(dir.path().join("diffs")).unwrap();
        let vcs = StaticVcs::default();
        let runner = StaticTestRunner::passing();
        let ctx = GovernanceContext {
            store: &store,
            book: &book,
            ledger: &ledger,
            archive: &archive,
            vcs: &vcs,
            runner: &runner,
            base_ref: "HEAD",
            governed_paths: &[],
        };

        let result = GovernancePipeline::new().run(&ctx);
        assert!(!result.passed);
        assert_eq!(result.stages.len(), 1);

        let all = GovernancePipeline::new().keep_going().run(&ctx);
        assert!(!all.passed);
        assert_eq!(all.stages.len(), 5);
    }
}
