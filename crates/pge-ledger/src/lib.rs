//! PGE Audit Ledger
//!
//! Append-only execution log plus a content-addressed diff archive. Every
//! executor invocation appends exactly one [`AuditLogEntry`], success or
//! failure; an execution with no ledger entry is invalid by definition.
//!
//! # Guarantees
//!
//! - The ledger file is write-once-append, never rewritten in place.
//! - Concurrent appenders (separate processes) serialize on an exclusive
//!   advisory file lock held only for the duration of each write; lock
//!   acquisition blocks rather than fails.
//! - Entries carry a sha256 chain (`prev_hash` -> `hash`) so in-place
//!   rewrites are detectable after the fact.
//! - Archived diffs are pinned by a Blake3 hash recorded at write time; a
//!   recomputation mismatch is a tamper signal, not a retryable error.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod archive;
mod clock;
mod entry;
mod ledger;

pub use archive::{DiffArchive, DiffRef, SavedDiff};
pub use clock::MonotonicClock;
pub use entry::{AuditLogEntry, ExecutionMode, ExecutionStatus, NewAuditEntry};
pub use ledger::{AuditError, Ledger};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
