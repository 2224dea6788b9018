//! Stage 4: delegated test execution
//!
//! This stage does not know how to run tests for any particular
//! language; it invokes the injected [`crate::TestRunner`] and reports
//! its pass/fail verbatim.

use crate::stages::{CiStage, GovernanceContext};
use crate::types::{CiFailure, CiFailureCode};

const OUTPUT_LIMIT: usize = 2000;

#[derive(Debug, Default)]
pub struct TestExecutionStage;

impl CiStage for TestExecutionStage {
    fn name(&self) -> &'static str {
        "test_execution"
    }

    fn run(&self, ctx: &GovernanceContext<'_>) -> Vec<CiFailure> {
        match ctx.runner.run() {
            Ok(outcome) if outcome.passed => Vec::new(),
            Ok(outcome) => {
                let mut output = outcome.output;
                if output.len() > OUTPUT_LIMIT {
                    output.truncate(OUTPUT_LIMIT);
                    output.push_str("… (truncated)");
                }
                vec![CiFailure::new(
                    CiFailureCode::TestExecutionFailed,
                    format!("delegated test run failed: {output}"),
                )]
            }
            // A runner that cannot start (or timed out in the caller) is
            // a stage failure, never silently swallowed.
            Err(e) => vec![CiFailure::new(
                CiFailureCode::TestExecutionFailed,
                e.to_string(),
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{StaticTestRunner, TestRunner};
    use crate::vcs::StaticVcs;
    use pge_artifact::{ApprovalBook, MemoryArtifactStore};
    use pge_ledger::{DiffArchive, Ledger};

    fn run_with(runner: &dyn TestRunner) -> Vec<CiFailure> {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryArtifactStore::new();
        let book = ApprovalBook::new(dir.path().join("approvals.jsonl"));
        let ledger = Ledger::new(dir.path().join("ledger.jsonl"));
        let archive = DiffArchive::open(dir.path().join("diffs")).unwrap();
        let vcs = StaticVcs::default();
        let ctx = GovernanceContext {
            store: &store,
            book: &book,
            ledger: &ledger,
            archive: &archive,
            vcs: &vcs,
            runner,
            base_ref: "HEAD",
            governed_paths: &[],
        };
        TestExecutionStage.run(&ctx)
    }

    #[test]
    fn passing_run_has_no_failures() {
        assert!(run_with(&StaticTestRunner::passing()).is_empty());
    }

    #[test]
    fn failing_run_carries_runner_output() {
        let failures = run_with(&StaticTestRunner::failing("assertion failed: left != right"));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, CiFailureCode::TestExecutionFailed);
        assert!(failures[0].message.contains("assertion failed"));
    }

    #[test]
    fn long_output_is_truncated() {
        let failures = run_with(&StaticTestRunner::failing("x".repeat(10_000)));
        assert!(failures[0].message.len() < 3000);
        assert!(failures[0].message.contains("truncated"));
    }
}
