//! PGE Executor Pipeline
//!
//! Mechanical executors that turn an approved plan artifact into a diff
//! and optionally apply it. Three variants ship (scaffold creation,
//! diff application, mechanical refactor), all driven through one
//! fixed nine-step sequence by [`ExecutorEngine`]:
//!
//! 1. load the artifact
//! 2. validate its payload schema
//! 3. cross-check the independent approval record (never trust the
//!    envelope's own status field alone)
//! 4. check every requested operation against the capability registry
//! 5. run variant-specific preconditions
//! 6. compute the diff and archive it, regardless of mode
//! 7. in APPLY mode, apply the diff atomically
//! 8. append exactly one audit ledger entry, success or failure
//! 9. return the [`ExecutionResult`]
//!
//! The engine aborts at the first failing step with no partial mutation;
//! an execution whose ledger entry cannot be written is failed even if
//! every earlier step succeeded.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod apply;
mod diff;
mod engine;
mod error;
mod paths;
mod variants;

pub use diff::{DiffPlan, FileChange};
pub use engine::{ExecutionResult, ExecutorContext, ExecutorEngine, ExecutorVariant};
pub use error::{ApplyError, CapabilityFailure, ExecutorError, PlanFailure, PreconditionError};
pub use pge_ledger::{DiffRef, ExecutionMode, ExecutionStatus};
pub use variants::{DiffApplyExecutor, RefactorExecutor, ScaffoldExecutor, SCAFFOLD_MARKER};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
