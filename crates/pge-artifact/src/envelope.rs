//! Artifact envelope and lifecycle status machine
//!
//! The envelope is the status/metadata wrapper around an opaque plan
//! payload. Status transitions are strictly forward:
//! DRAFT -> APPROVED -> LOCKED, and only a TestPlan may reach LOCKED.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::ContentHash;

/// Lifecycle state of an artifact
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArtifactStatus {
    Draft,
    Approved,
    Locked,
}

impl ArtifactStatus {
    /// States reachable from this one
    ///
    /// Transitions only move forward; LOCKED is terminal.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [ArtifactStatus] {
        match self {
            Self::Draft => &[Self::Approved],
            Self::Approved => &[Self::Locked],
            Self::Locked => &[],
        }
    }

    /// Whether `self -> to` is a legal forward transition
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Uppercase identifier used in persisted envelopes
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Approved => "APPROVED",
            Self::Locked => "LOCKED",
        }
    }
}

impl Display for ArtifactStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of plan artifact kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    ProjectPlan,
    ScaffoldPlan,
    TestPlan,
    ImplementationPlan,
    RefactorPlan,
    ValidationResult,
}

impl ArtifactKind {
    /// Stable kebab-case slug used in ids and file names
    #[inline]
    #[must_use]
    pub const fn slug(&self) -> &'static str {
        match self {
            Self::ProjectPlan => "project-plan",
            Self::ScaffoldPlan => "scaffold-plan",
            Self::TestPlan => "test-plan",
            Self::ImplementationPlan => "implementation-plan",
            Self::RefactorPlan => "refactor-plan",
            Self::ValidationResult => "validation-result",
        }
    }

    /// Only TestPlans may be locked
    #[inline]
    #[must_use]
    pub const fn is_lockable(&self) -> bool {
        matches!(self, Self::TestPlan)
    }

    /// All kinds, for scans
    #[must_use]
    pub const fn all() -> [ArtifactKind; 6] {
        [
            Self::ProjectPlan,
            Self::ScaffoldPlan,
            Self::TestPlan,
            Self::ImplementationPlan,
            Self::RefactorPlan,
            Self::ValidationResult,
        ]
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ArtifactKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|kind| kind.slug() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Kind slug outside the closed set
#[derive(Debug, thiserror::Error)]
#[error("unknown artifact kind: {0}")]
pub struct UnknownKind(pub String);

/// Opaque unique artifact identifier
///
/// Formatted as `<kind-slug>-<uuid>`; treated as opaque everywhere after
/// construction.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Mint a fresh id for a kind
    #[must_use]
    pub fn generate(kind: ArtifactKind) -> Self {
        Self(format!("{}-{}", kind.slug(), Uuid::new_v4()))
    }

    /// Wrap an existing identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// String view
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ArtifactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A versioned unit of plan intent
///
/// # Invariants
/// - `status` only moves forward through the lifecycle machine
/// - `payload` is opaque to this core beyond per-kind schema validation
/// - once LOCKED, payload bytes never change; governance detects any drift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub schema_version: u32,
    pub status: ArtifactStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<ArtifactId>,
    pub payload: serde_json::Value,
}

/// Current envelope schema version
pub const SCHEMA_VERSION: u32 = 1;

impl ArtifactEnvelope {
    /// Construct a DRAFT envelope with a fresh id
    ///
    /// Payload schema validation happens in the lifecycle service, not
    /// here.
    #[must_use]
    pub fn new_draft(
        kind: ArtifactKind,
        payload: serde_json::Value,
        depends_on: BTreeSet<ArtifactId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ArtifactId::generate(kind),
            kind,
            schema_version: SCHEMA_VERSION,
            status: ArtifactStatus::Draft,
            created_at: now,
            updated_at: now,
            last_reviewed_at: None,
            review_notes: None,
            depends_on,
            payload,
        }
    }

    /// Blake3 hash of the payload's canonical JSON encoding
    ///
    /// This is the value pinned by lock records and re-checked by
    /// governance.
    #[inline]
    #[must_use]
    pub fn payload_hash(&self) -> ContentHash {
        ContentHash::of_value(&self.payload)
    }
}
