//! Artifact lifecycle service
//!
//! Enforces the DRAFT -> APPROVED -> LOCKED state machine and the
//! dependency-satisfaction rule on top of an [`ArtifactStore`] and the
//! [`ApprovalBook`]. No side effects beyond store and book writes; every
//! operation re-derives state from the store, so retries after transient
//! store failures are safe and re-running `approve` on an already
//! APPROVED artifact fails loudly instead of silently succeeding.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::approval::{ApprovalBook, ApprovalError, ApprovalRecord, LockRecord};
use crate::envelope::{ArtifactEnvelope, ArtifactId, ArtifactKind, ArtifactStatus};
use crate::schema::{validate_payload, SchemaError};
use crate::store::{ArtifactStore, StoreError};

/// Errors raised by lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Payload failed its kind's schema
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Operation requires a different current status
    #[error("artifact {id} is {current}, operation requires {required}")]
    Status {
        id: ArtifactId,
        current: ArtifactStatus,
        required: &'static str,
    },

    /// A dependency is not yet APPROVED or LOCKED
    #[error("dependency {dependency} of {id} is {status}, must be APPROVED or LOCKED")]
    Dependency {
        id: ArtifactId,
        dependency: ArtifactId,
        status: ArtifactStatus,
    },

    /// A dependency id does not resolve to any artifact
    #[error("dependency {dependency} of {id} does not exist")]
    MissingDependency {
        id: ArtifactId,
        dependency: ArtifactId,
    },

    /// Only lockable kinds may be locked
    #[error("artifact {id} of kind {kind} is not lockable")]
    NotLockable { id: ArtifactId, kind: ArtifactKind },

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Approval book failure
    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

impl LifecycleError {
    /// Short operator hint for resolving the failure
    #[must_use]
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::Schema(_) => "fix the payload to match the kind's schema and re-create",
            Self::Status { .. } => "check the artifact's current status before retrying",
            Self::Dependency { .. } => "run approve on the listed dependency first",
            Self::MissingDependency { .. } => "create the missing dependency or drop it from depends_on",
            Self::NotLockable { .. } => "only test plans can be locked",
            Self::Store(_) | Self::Approval(_) => "inspect the governed store files and retry",
        }
    }
}

/// The lifecycle state machine over a store and approval book
#[derive(Debug)]
pub struct ArtifactLifecycle<S> {
    store: S,
    book: ApprovalBook,
}

impl<S: ArtifactStore> ArtifactLifecycle<S> {
    /// Build over an explicit store and approval book
    ///
    /// Constructed once at process start and passed in; no ambient
    /// registries.
    #[inline]
    #[must_use]
    pub fn new(store: S, book: ApprovalBook) -> Self {
        Self { store, book }
    }

    /// The underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The approval book
    #[inline]
    #[must_use]
    pub fn book(&self) -> &ApprovalBook {
        &self.book
    }

    /// Create a DRAFT envelope from a candidate payload
    ///
    /// The payload comes from the external plan generator and is
    /// validated against the kind's schema before anything is persisted.
    ///
    /// # Errors
    /// [`LifecycleError::Schema`] if the payload is invalid.
    pub fn create(
        &self,
        kind: ArtifactKind,
        payload: serde_json::Value,
        depends_on: BTreeSet<ArtifactId>,
    ) -> Result<ArtifactEnvelope, LifecycleError> {
        validate_payload(kind, &payload)?;
        let envelope = ArtifactEnvelope::new_draft(kind, payload, depends_on);
        self.store.save(&envelope)?;
        tracing::info!(id = %envelope.id, %kind, "created draft artifact");
        Ok(envelope)
    }

    /// Approve a DRAFT artifact
    ///
    /// Every dependency must already be APPROVED or LOCKED. Appends an
    /// approval record to the book; the envelope's own status field is
    /// never the sole evidence of approval.
    ///
    /// # Errors
    /// [`LifecycleError::Status`] unless the artifact is DRAFT;
    /// [`LifecycleError::Dependency`] on the first unsatisfied dependency.
    pub fn approve(
        &self,
        id: &ArtifactId,
        approver: &str,
    ) -> Result<ArtifactEnvelope, LifecycleError> {
        let mut envelope = self.store.load(id)?;
        if envelope.status != ArtifactStatus::Draft {
            return Err(LifecycleError::Status {
                id: id.clone(),
                current: envelope.status,
                required: "DRAFT",
            });
        }

        for dependency in &envelope.depends_on {
            let dep = match self.store.load(dependency) {
                Ok(dep) => dep,
                Err(StoreError::NotFound { .. }) => {
                    return Err(LifecycleError::MissingDependency {
                        id: id.clone(),
                        dependency: dependency.clone(),
                    })
                }
                Err(e) => return Err(e.into()),
            };
            if dep.status == ArtifactStatus::Draft {
                return Err(LifecycleError::Dependency {
                    id: id.clone(),
                    dependency: dependency.clone(),
                    status: dep.status,
                });
            }
        }

        envelope.status = ArtifactStatus::Approved;
        envelope.updated_at = Utc::now();
        self.store.save(&envelope)?;
        self.book.record_approval(ApprovalRecord {
            artifact_id: envelope.id.clone(),
            approved_by: approver.to_string(),
            approved_at_ms: now_ms(),
            payload_hash: envelope.payload_hash(),
        })?;
        tracing::info!(id = %envelope.id, approver, "approved artifact");
        Ok(envelope)
    }

    /// Lock an APPROVED TestPlan, pinning its payload hash
    ///
    /// # Errors
    /// [`LifecycleError::NotLockable`] for any other kind;
    /// [`LifecycleError::Status`] unless currently APPROVED.
    pub fn lock(&self, id: &ArtifactId) -> Result<ArtifactEnvelope, LifecycleError> {
        let mut envelope = self.store.load(id)?;
        if !envelope.kind.is_lockable() {
            return Err(LifecycleError::NotLockable {
                id: id.clone(),
                kind: envelope.kind,
            });
        }
        if envelope.status != ArtifactStatus::Approved {
            return Err(LifecycleError::Status {
                id: id.clone(),
                current: envelope.status,
                required: "APPROVED",
            });
        }

        envelope.status = ArtifactStatus::Locked;
        envelope.updated_at = Utc::now();
        self.store.save(&envelope)?;
        self.book.record_lock(LockRecord {
            artifact_id: envelope.id.clone(),
            payload_hash: envelope.payload_hash(),
            locked_at_ms: now_ms(),
        })?;
        tracing::info!(id = %envelope.id, hash = %envelope.payload_hash().short(), "locked artifact");
        Ok(envelope)
    }

    /// Record a review without changing status
    ///
    /// # Errors
    /// [`LifecycleError::Status`] if the artifact is LOCKED; a review of a
    /// locked artifact would imply content change.
    pub fn record_review(
        &self,
        id: &ArtifactId,
        notes: &str,
    ) -> Result<ArtifactEnvelope, LifecycleError> {
        let mut envelope = self.store.load(id)?;
        if envelope.status == ArtifactStatus::Locked {
            return Err(LifecycleError::Status {
                id: id.clone(),
                current: envelope.status,
                required: "DRAFT or APPROVED",
            });
        }

        envelope.last_reviewed_at = Some(Utc::now());
        envelope.review_notes = Some(notes.to_string());
        self.store.save(&envelope)?;
        tracing::debug!(id = %envelope.id, "recorded review");
        Ok(envelope)
    }
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}
