//! All-or-nothing diff application
//!
//! Apply runs in three phases: preflight (verify every expected `before`
//! content, no mutation), stage (write new content to `.pge-stage`
//! siblings and copy originals to `.pge-bak`), commit (rename staged
//! files into place in declaration order). Any commit failure rolls the
//! completed steps back from the backups, so the observable outcome is
//! either every file updated or none. A rollback failure is the one case
//! that surfaces as [`ApplyError::PartialApplyDetected`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::diff::{DiffPlan, FileChange};
use crate::error::ApplyError;
use crate::paths::resolve_in_root;

const STAGE_SUFFIX: &str = "pge-stage";
const BACKUP_SUFFIX: &str = "pge-bak";

enum ResolvedChange {
    Create { path: PathBuf, content: String },
    Modify { path: PathBuf, after: String },
    Delete { path: PathBuf },
    Move { from: PathBuf, to: PathBuf },
}

/// Apply the plan under `root` atomically
///
/// # Errors
/// [`ApplyError::PatchRejected`] when the repository no longer matches
/// the diff's expected content or any I/O step fails (repository left in
/// its pre-apply state); [`ApplyError::PartialApplyDetected`] only when
/// rollback itself fails.
pub(crate) fn apply(plan: &DiffPlan, root: &Path) -> Result<(), ApplyError> {
    let resolved = preflight(plan, root)?;

    let mut stage = Stage::default();
    if let Err(message) = stage.prepare(&resolved) {
        stage.cleanup();
        return Err(ApplyError::PatchRejected { message });
    }

    let mut committed: Vec<&ResolvedChange> = Vec::new();
    for change in &resolved {
        if let Err(message) = stage.commit(change) {
            return match stage.rollback(&committed) {
                Ok(()) => {
                    stage.cleanup();
                    Err(ApplyError::PatchRejected { message })
                }
                Err(rollback_message) => Err(ApplyError::PartialApplyDetected {
                    message: format!("{message}; rollback failed: {rollback_message}"),
                }),
            };
        }
        committed.push(change);
    }

    stage.cleanup();
    Ok(())
}

fn preflight(plan: &DiffPlan, root: &Path) -> Result<Vec<ResolvedChange>, ApplyError> {
    let rejected = |message: String| ApplyError::PatchRejected { message };
    let resolve =
        |declared: &str| resolve_in_root(root, declared).map_err(|e| rejected(e.to_string()));
    let read = |path: &Path, declared: &str| {
        fs::read_to_string(path).map_err(|e| rejected(format!("cannot read {declared}: {e}")))
    };

    let mut resolved = Vec::with_capacity(plan.changes.len());
    for change in &plan.changes {
        match change {
            FileChange::Create { path, content } => {
                let target = resolve(path)?;
                if target.exists() {
                    return Err(rejected(format!("create target already exists: {path}")));
                }
                resolved.push(ResolvedChange::Create {
                    path: target,
                    content: content.clone(),
                });
            }
            FileChange::Modify {
                path,
                before,
                after,
            } => {
                let target = resolve(path)?;
                if read(&target, path)? != *before {
                    return Err(rejected(format!("content drift in {path}")));
                }
                resolved.push(ResolvedChange::Modify {
                    path: target,
                    after: after.clone(),
                });
            }
            FileChange::Delete { path, before } => {
                let target = resolve(path)?;
                if read(&target, path)? != *before {
                    return Err(rejected(format!("content drift in {path}")));
                }
                resolved.push(ResolvedChange::Delete { path: target });
            }
            FileChange::Move { from, to } => {
                let source = resolve(from)?;
                let dest = resolve(to)?;
                if !source.exists() {
                    return Err(rejected(format!("move source missing: {from}")));
                }
                if dest.exists() {
                    return Err(rejected(format!("move destination exists: {to}")));
                }
                resolved.push(ResolvedChange::Move {
                    from: source,
                    to: dest,
                });
            }
        }
    }
    Ok(resolved)
}

/// Tracks staged content and backups through commit and rollback
#[derive(Default)]
struct Stage {
    staged: Vec<PathBuf>,
    backups: Vec<(PathBuf, PathBuf)>,
}

impl Stage {
    /// Write stage files and backups; nothing visible changes yet
    fn prepare(&mut self, resolved: &[ResolvedChange]) -> Result<(), String> {
        for change in resolved {
            match change {
                ResolvedChange::Create { path, content }
                | ResolvedChange::Modify {
                    path,
                    after: content,
                } => {
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)
                            .map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
                    }
                    let stage_path = suffixed(path, STAGE_SUFFIX);
                    fs::write(&stage_path, content)
                        .map_err(|e| format!("cannot stage {}: {e}", stage_path.display()))?;
                    self.staged.push(stage_path);
                }
                ResolvedChange::Delete { .. } | ResolvedChange::Move { .. } => {}
            }
            match change {
                ResolvedChange::Modify { path, .. } | ResolvedChange::Delete { path } => {
                    let backup = suffixed(path, BACKUP_SUFFIX);
                    fs::copy(path, &backup)
                        .map_err(|e| format!("cannot back up {}: {e}", path.display()))?;
                    self.backups.push((path.clone(), backup));
                }
                ResolvedChange::Create { .. } | ResolvedChange::Move { .. } => {}
            }
        }
        Ok(())
    }

    fn commit(&self, change: &ResolvedChange) -> Result<(), String> {
        match change {
            ResolvedChange::Create { path, .. } | ResolvedChange::Modify { path, .. } => {
                let stage_path = suffixed(path, STAGE_SUFFIX);
                fs::rename(&stage_path, path)
                    .map_err(|e| format!("cannot rename into {}: {e}", path.display()))
            }
            ResolvedChange::Delete { path } => fs::remove_file(path)
                .map_err(|e| format!("cannot delete {}: {e}", path.display())),
            ResolvedChange::Move { from, to } => {
                if let Some(parent) = to.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
                }
                fs::rename(from, to).map_err(|e| {
                    format!("cannot move {} to {}: {e}", from.display(), to.display())
                })
            }
        }
    }

    /// Undo completed commits in reverse order
    fn rollback(&self, committed: &[&ResolvedChange]) -> Result<(), String> {
        for change in committed.iter().rev() {
            match change {
                ResolvedChange::Create { path, .. } => {
                    fs::remove_file(path)
                        .map_err(|e| format!("cannot undo create of {}: {e}", path.display()))?;
                }
                ResolvedChange::Modify { path, .. } | ResolvedChange::Delete { path } => {
                    let backup = self
                        .backups
                        .iter()
                        .find(|(original, _)| original == path)
                        .map(|(_, b)| b.clone())
                        .ok_or_else(|| format!("no backup for {}", path.display()))?;
                    fs::copy(&backup, path)
                        .map_err(|e| format!("cannot restore {}: {e}", path.display()))?;
                }
                ResolvedChange::Move { from, to } => {
                    fs::rename(to, from)
                        .map_err(|e| format!("cannot undo move of {}: {e}", to.display()))?;
                }
            }
        }
        Ok(())
    }

    fn cleanup(&self) {
        for path in &self.staged {
            let _ = fs::remove_file(path);
        }
        for (_, backup) in &self.backups {
            let _ = fs::remove_file(backup);
        }
    }
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_extension(format!("{ext}.{suffix}")),
        None => path.with_extension(suffix),
    }
}
