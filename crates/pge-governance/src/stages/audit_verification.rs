//! Stage 5: audit verification
//!
//! Every file change in the current change set needs a corresponding
//! audit ledger entry; a change without one is orphaned. The ledger's
//! own hash chain and every archived diff's recorded hash are
//! re-verified as well.

use std::collections::BTreeSet;

use pge_ledger::{AuditError, DiffRef};

use crate::stages::{is_under, CiStage, GovernanceContext};
use crate::types::{CiFailure, CiFailureCode};

#[derive(Debug, Default)]
pub struct AuditVerificationStage;

impl CiStage for AuditVerificationStage {
    fn name(&self) -> &'static str {
        "audit_verification"
    }

    fn run(&self, ctx: &GovernanceContext<'_>) -> Vec<CiFailure> {
        let changed = match ctx.vcs.changed_files(ctx.base_ref) {
            Ok(changed) => changed,
            Err(e) => return vec![CiFailure::new(CiFailureCode::VcsQueryFailed, e.to_string())],
        };
        let entries = match ctx.ledger.read_all() {
            Ok(entries) => entries,
            Err(e) => {
                return vec![CiFailure::new(CiFailureCode::LedgerUnreadable, e.to_string())]
            }
        };

        let audited: BTreeSet<&str> = entries
            .iter()
            .flat_map(|entry| entry.affected_files.iter().map(String::as_str))
            .collect();

        let mut failures = Vec::new();
        for file in &changed {
            if ctx.governed_paths.iter().any(|p| is_under(file, p)) {
                continue;
            }
            if !audited.contains(file.as_str()) {
                failures.push(
                    CiFailure::new(
                        CiFailureCode::OrphanedCodeChange,
                        format!("{file} changed with no matching audit ledger entry"),
                    )
                    .with_file(file),
                );
            }
        }

        if let Err(e) = ctx.ledger.verify_chain() {
            failures.push(CiFailure::new(CiFailureCode::LedgerChainBroken, e.to_string()));
        }

        for entry in &entries {
            let (Some(reference), Some(expected)) = (&entry.diff_ref, entry.diff_hash) else {
                continue;
            };
            match ctx.archive.verify(&DiffRef::new(reference.clone()), expected) {
                Ok(()) => {}
                Err(e @ (AuditError::DiffHashMismatch { .. } | AuditError::DiffNotFound { .. })) => {
                    failures.push(
                        CiFailure::new(CiFailureCode::DiffHashMismatch, e.to_string())
                            .with_file(reference),
                    );
                }
                Err(e) => {
                    failures
                        .push(CiFailure::new(CiFailureCode::LedgerUnreadable, e.to_string()));
                }
            }
        }
        failures
    }
}
