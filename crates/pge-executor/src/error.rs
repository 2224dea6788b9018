//! Executor error taxonomy
//!
//! Closed nested enums mirroring the failure classes: precondition,
//! capability, plan (artifact), apply and audit. Every variant carries a
//! stable code and a remediation hint; all of them fail fast before any
//! repository mutation except [`ApplyError`], which guarantees the
//! repository is left in its pre-apply state.

use pge_artifact::{ApprovalError, ArtifactId, ArtifactKind, SchemaError, StoreError};
use pge_capability::{Language, MechanicalOperation};
use pge_ledger::AuditError;

/// Preconditions checked before any mutation
#[derive(Debug, thiserror::Error)]
pub enum PreconditionError {
    /// No matching independent approval record, or a status field that
    /// does not line up with one
    #[error("artifact {id} is not approved for execution: {reason}")]
    NotApproved { id: ArtifactId, reason: String },

    /// Destination already exists
    #[error("path already exists: {path}")]
    AlreadyExists { path: String },

    /// Required source path is missing
    #[error("path not found: {path}")]
    NotFound { path: String },

    /// Path resolves outside the repository root
    #[error("path escapes repository root: {path}")]
    PathEscapesRoot { path: String },

    /// Touches a protected test path while a TestPlan is locked
    #[error("protected test path would be modified: {path}")]
    ProtectedPathModified { path: String },

    /// Diff declares a file outside the plan's authorized targets
    #[error("file not authorized by the plan's target set: {path}")]
    TargetNotAuthorized { path: String },
}

/// Capability check failures
#[derive(Debug, thiserror::Error)]
pub enum CapabilityFailure {
    /// Operation not supported for the target language (strict check)
    #[error("operation {operation} is not supported for {language}")]
    UnsupportedOperation {
        operation: MechanicalOperation,
        language: Language,
    },

    /// No target language could be detected; checks fail closed
    #[error("could not detect target language: {hint}")]
    LanguageUndetected { hint: String },
}

/// Plan artifact failures
#[derive(Debug, thiserror::Error)]
pub enum PlanFailure {
    /// Payload failed its kind's schema
    #[error(transparent)]
    SchemaInvalid(#[from] SchemaError),

    /// Executor was handed the wrong artifact kind
    #[error("artifact {id} is a {actual}, executor requires a {expected}")]
    WrongKind {
        id: ArtifactId,
        expected: ArtifactKind,
        actual: ArtifactKind,
    },

    /// Embedded diff text does not parse
    #[error("plan diff is invalid: {message}")]
    InvalidDiff { message: String },
}

/// Apply step failures
///
/// The repository is in its pre-apply state after `PatchRejected`.
/// `PartialApplyDetected` must never be observed in normal operation; it
/// means the all-or-nothing guarantee itself broke.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The diff could not be applied; every staged change was rolled back
    #[error("patch rejected: {message}")]
    PatchRejected { message: String },

    /// Rollback failed after a partial commit; the listed paths need
    /// manual inspection
    #[error("partial apply detected, manual recovery required: {message}")]
    PartialApplyDetected { message: String },
}

/// Top-level executor error
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Capability(#[from] CapabilityFailure),

    #[error(transparent)]
    Plan(#[from] PlanFailure),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Audit ledger or diff archive failure
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Artifact store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Approval book failure
    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

impl ExecutorError {
    /// Stable closed-set failure code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Precondition(e) => match e {
                PreconditionError::NotApproved { .. } => "NOT_APPROVED",
                PreconditionError::AlreadyExists { .. } => "ALREADY_EXISTS",
                PreconditionError::NotFound { .. } => "NOT_FOUND",
                PreconditionError::PathEscapesRoot { .. } => "PATH_ESCAPES_ROOT",
                PreconditionError::ProtectedPathModified { .. } => "PROTECTED_PATH_MODIFIED",
                PreconditionError::TargetNotAuthorized { .. } => "TARGET_NOT_AUTHORIZED",
            },
            Self::Capability(e) => match e {
                CapabilityFailure::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
                CapabilityFailure::LanguageUndetected { .. } => "LANGUAGE_UNDETECTED",
            },
            Self::Plan(e) => match e {
                PlanFailure::SchemaInvalid(_) => "SCHEMA_INVALID",
                PlanFailure::WrongKind { .. } => "WRONG_KIND",
                PlanFailure::InvalidDiff { .. } => "INVALID_DIFF",
            },
            Self::Apply(e) => match e {
                ApplyError::PatchRejected { .. } => "PATCH_REJECTED",
                ApplyError::PartialApplyDetected { .. } => "PARTIAL_APPLY_DETECTED",
            },
            Self::Audit(_) => "LEDGER_WRITE_FAILED",
            Self::Store(_) => "STORE_FAILED",
            Self::Approval(_) => "APPROVAL_BOOK_FAILED",
        }
    }

    /// Short operator hint for resolving the failure
    #[must_use]
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::Precondition(PreconditionError::NotApproved { .. }) => {
                "run approve on this artifact id, then retry"
            }
            Self::Precondition(PreconditionError::ProtectedPathModified { .. }) => {
                "remove the protected path from the plan or unlock the test plan first"
            }
            Self::Precondition(_) => "fix the plan's paths and re-create the artifact",
            Self::Capability(_) => {
                "remove the unsupported operation or extend the capability override"
            }
            Self::Plan(_) => "re-create the artifact with a valid payload",
            Self::Apply(ApplyError::PatchRejected { .. }) => {
                "the repository changed since the diff was approved; regenerate the plan"
            }
            Self::Apply(ApplyError::PartialApplyDetected { .. }) => {
                "inspect the listed paths by hand before any further execution"
            }
            Self::Audit(_) => "restore ledger/archive access; the execution is invalid until logged",
            Self::Store(_) | Self::Approval(_) => "inspect the governed store files and retry",
        }
    }
}
