//! CI result document types
//!
//! Closed tagged variants for failure codes plus the JSON-serializable
//! result document: `{passed, stages: [{stage, passed, failures,
//! duration_ms}], total_duration_ms, timestamp}`.

use serde::{Deserialize, Serialize};

/// Closed set of governance failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CiFailureCode {
    SchemaViolation,
    DraftArtifactPresent,
    LockedArtifactModified,
    MissingApproval,
    DanglingApproval,
    ProtectedTestModified,
    UnplannedCodeChange,
    TestExecutionFailed,
    OrphanedCodeChange,
    DiffHashMismatch,
    LedgerChainBroken,
    LedgerUnreadable,
    StoreUnreadable,
    VcsQueryFailed,
}

impl CiFailureCode {
    /// Operator hint attached to every failure with this code
    #[must_use]
    pub const fn remediation(&self) -> &'static str {
        match self {
            Self::SchemaViolation => "fix the artifact payload to match its kind's schema",
            Self::DraftArtifactPresent => "run approve on this artifact id or delete the draft",
            Self::LockedArtifactModified => {
                "restore the locked payload from its approved version; locked content must never change"
            }
            Self::MissingApproval => "run approve on this artifact id to append an approval record",
            Self::DanglingApproval => "remove the stale approval record or restore the artifact",
            Self::ProtectedTestModified => {
                "revert the protected test change or unlock the test plan first"
            }
            Self::UnplannedCodeChange => {
                "create and approve an implementation or refactor plan covering this file"
            }
            Self::TestExecutionFailed => "fix the failing tests before trusting this change set",
            Self::OrphanedCodeChange => {
                "re-run the change through an executor so it is recorded in the audit ledger"
            }
            Self::DiffHashMismatch => "the archived diff was tampered with; restore it from backup",
            Self::LedgerChainBroken => "the ledger was rewritten in place; restore it from backup",
            Self::LedgerUnreadable => "restore read access to the audit ledger file",
            Self::StoreUnreadable => "restore read access to the artifact store",
            Self::VcsQueryFailed => "check that the repository and base reference are valid",
        }
    }
}

/// One governance failure with its remediation hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiFailure {
    pub code: CiFailureCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub remediation: String,
}

impl CiFailure {
    /// Failure with the code's standard remediation
    #[must_use]
    pub fn new(code: CiFailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file_path: None,
            remediation: code.remediation().to_string(),
        }
    }

    /// Attach the offending file path
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }
}

/// Aggregate of one stage's run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiStageResult {
    pub stage: String,
    pub passed: bool,
    pub failures: Vec<CiFailure>,
    pub duration_ms: u64,
}

impl CiStageResult {
    /// Build from a stage's collected failures
    #[must_use]
    pub fn new(stage: impl Into<String>, failures: Vec<CiFailure>, duration_ms: u64) -> Self {
        Self {
            stage: stage.into(),
            passed: failures.is_empty(),
            failures,
            duration_ms,
        }
    }
}

/// Aggregate of a whole pipeline run
///
/// `passed` is true only if every *executed* stage passed; with
/// `stop_on_failure` the skipped stages simply do not appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiResult {
    pub passed: bool,
    pub stages: Vec<CiStageResult>,
    pub total_duration_ms: u64,
    pub timestamp: String,
}

impl CiResult {
    /// Render the CI result document as pretty JSON
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| String::from("{}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn failure_carries_code_remediation() {
        let failure = CiFailure::new(CiFailureCode::UnplannedCodeChange, "src/rogue.rs changed")
            .with_file("src/rogue.rs");
        assert_eq!(failure.remediation, CiFailureCode::UnplannedCodeChange.remediation());
        assert_eq!(failure.file_path.as_deref(), Some("src/rogue.rs"));
    }

    #[test]
    fn stage_result_passed_iff_no_failures() {
        assert!(CiStageResult::new("artifact_validation", vec![], 5).passed);
        let failing = CiStageResult::new(
            "artifact_validation",
            vec![CiFailure::new(CiFailureCode::DraftArtifactPresent, "draft found")],
            5,
        );
        assert!(!failing.passed);
    }

    #[test]
    fn failure_codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&CiFailureCode::LockedArtifactModified).unwrap();
        assert_eq!(json, "\"LOCKED_ARTIFACT_MODIFIED\"");
        let json = serde_json::to_string(&CiFailureCode::OrphanedCodeChange).unwrap();
        assert_eq!(json, "\"ORPHANED_CODE_CHANGE\"");
    }

    #[test]
    fn result_document_round_trip() {
        let result = CiResult {
            passed: false,
            stages: vec![CiStageResult::new(
                "audit_verification",
                vec![CiFailure::new(CiFailureCode::OrphanedCodeChange, "no entry")
                    .with_file("src/a.rs")],
                12,
            )],
            total_duration_ms: 12,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        };

        let decoded: CiResult = serde_json::from_str(&result.to_json()).unwrap();
        assert_eq!(decoded, result);
    }
}
