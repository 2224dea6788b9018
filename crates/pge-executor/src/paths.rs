//! Repository-relative path validation

use std::path::{Component, Path, PathBuf};

use crate::error::PreconditionError;

/// Resolve a declared relative path inside the repository root
///
/// The check is lexical (declared paths usually do not exist yet):
/// absolute paths, drive prefixes and any `..` component are rejected.
///
/// # Errors
/// [`PreconditionError::PathEscapesRoot`] for anything that would land
/// outside `root`.
pub(crate) fn resolve_in_root(root: &Path, declared: &str) -> Result<PathBuf, PreconditionError> {
    let rel = Path::new(declared);
    let escapes = rel.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if declared.is_empty() || escapes {
        return Err(PreconditionError::PathEscapesRoot {
            path: declared.to_string(),
        });
    }
    Ok(root.join(rel))
}

/// True when `path` is equal to or under the (repo-relative) prefix
pub(crate) fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix || path.starts_with(&format!("{prefix}/"))
}
