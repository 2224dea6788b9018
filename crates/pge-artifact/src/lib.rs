//! PGE Artifact System
//!
//! Versioned, schema-validated plan artifacts with a strictly forward
//! DRAFT -> APPROVED -> LOCKED lifecycle.
//!
//! # Core Concepts
//!
//! - [`ArtifactEnvelope`]: the status/metadata wrapper around a plan payload
//! - [`ArtifactLifecycle`]: create/approve/lock/record_review operations
//! - [`ArtifactStore`]: load/save/list port (filesystem adapter plus an
//!   in-memory double)
//! - [`ApprovalBook`]: independently appended approval and lock records,
//!   never embedded inside the artifact file itself
//! - [`ContentHash`]: 32-byte Blake3 hash pinning locked payloads
//!
//! An artifact may move to APPROVED only when every dependency is already
//! APPROVED or LOCKED, and only a TestPlan may reach LOCKED. Once locked,
//! payload bytes must never change; any detected change is a governance
//! failure, not a silent update.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod approval;
mod envelope;
mod hash;
mod lifecycle;
mod schema;
mod store;

pub use approval::{ApprovalBook, ApprovalError, ApprovalRecord, LockRecord};
pub use envelope::{
    ArtifactEnvelope, ArtifactId, ArtifactKind, ArtifactStatus, UnknownKind, SCHEMA_VERSION,
};
pub use hash::{ContentHash, HashParseError};
pub use lifecycle::{ArtifactLifecycle, LifecycleError};
pub use schema::{validate_payload, SchemaError};
pub use store::{ArtifactStore, FsArtifactStore, MemoryArtifactStore, StoreError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
