//! Stage 2: approval verification
//!
//! The independent approval record set must cover every non-DRAFT
//! artifact, and every approval record must cross-reference an artifact
//! that actually exists.

use std::collections::BTreeSet;

use pge_artifact::ArtifactStatus;

use crate::stages::{CiStage, GovernanceContext};
use crate::types::{CiFailure, CiFailureCode};

#[derive(Debug, Default)]
pub struct ApprovalVerificationStage;

impl CiStage for ApprovalVerificationStage {
    fn name(&self) -> &'static str {
        "approval_verification"
    }

    fn run(&self, ctx: &GovernanceContext<'_>) -> Vec<CiFailure> {
        let envelopes = match ctx.store.list_all() {
            Ok(envelopes) => envelopes,
            Err(e) => {
                return vec![CiFailure::new(CiFailureCode::StoreUnreadable, e.to_string())]
            }
        };
        let approvals = match ctx.book.approvals() {
            Ok(approvals) => approvals,
            Err(e) => {
                return vec![CiFailure::new(CiFailureCode::StoreUnreadable, e.to_string())]
            }
        };

        let approved_ids: BTreeSet<_> =
            approvals.iter().map(|r| r.artifact_id.clone()).collect();
        let artifact_ids: BTreeSet<_> = envelopes.iter().map(|e| e.id.clone()).collect();

        let mut failures = Vec::new();
        for envelope in &envelopes {
            if envelope.status != ArtifactStatus::Draft && !approved_ids.contains(&envelope.id) {
                failures.push(
                    CiFailure::new(
                        CiFailureCode::MissingApproval,
                        format!(
                            "artifact {} is {} but has no approval record",
                            envelope.id, envelope.status
                        ),
                    )
                    .with_file(envelope.id.as_str()),
                );
            }
        }
        for approval in &approvals {
            if !artifact_ids.contains(&approval.artifact_id) {
                failures.push(
                    CiFailure::new(
                        CiFailureCode::DanglingApproval,
                        format!(
                            "approval by {} references missing artifact {}",
                            approval.approved_by, approval.artifact_id
                        ),
                    )
                    .with_file(approval.artifact_id.as_str()),
                );
            }
        }
        failures
    }
}
