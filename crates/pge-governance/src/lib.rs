//! PGE Governance Pipeline
//!
//! Five ordered stage validators that re-examine repository state, the
//! artifact set, the approval book and the audit ledger to decide
//! whether the current state is trustworthy:
//!
//! 1. artifact validation (schemas, no drafts, locked payloads unchanged)
//! 2. approval verification (independent records cross-reference artifacts)
//! 3. invariant enforcement (protected test paths, no unplanned changes)
//! 4. delegated test execution
//! 5. audit verification (no orphaned change, diff hashes intact)
//!
//! The orchestrator runs them in this fixed order; `stop_on_failure`
//! (default true) halts after the first failing stage, otherwise all
//! stages run and failures accumulate.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod orchestrator;
mod runner;
mod stages;
mod types;
mod vcs;

pub use orchestrator::GovernancePipeline;
pub use runner::{CommandTestRunner, RunnerError, StaticTestRunner, TestRunOutcome, TestRunner};
pub use stages::{
    ApprovalVerificationStage, ArtifactValidationStage, AuditVerificationStage, CiStage,
    GovernanceContext, InvariantStage, TestExecutionStage,
};
pub use types::{CiFailure, CiFailureCode, CiResult, CiStageResult};
pub use vcs::{GitVcs, StaticVcs, VcsError, VcsQuery};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
