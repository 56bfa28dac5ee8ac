//! Lexical path normalization shared by every authorizer.
//!
//! Authorization reasons about paths purely lexically: `.` and `..` are
//! resolved without touching the filesystem, and symlinks are not followed.

use std::path::{Component, Path, PathBuf};

use toolgate_traits::{AuthError, Result};

/// Normalize a path without canonicalizing.
///
/// `..` above the root stays at the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            c => result.push(c),
        }
    }
    result
}

/// Normalize a path a tool handed in; it must be absolute.
pub fn normalize_absolute(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(invalid(path, "path is empty"));
    }
    if !path.is_absolute() {
        return Err(invalid(path, "path is not absolute"));
    }
    Ok(normalize_path(path))
}

/// Resolve the sandbox directory given at construction time.
///
/// Relative directories are made absolute against the process working
/// directory.
pub fn resolve_sandbox_dir(dir: &Path) -> Result<PathBuf> {
    if dir.as_os_str().is_empty() {
        return Err(AuthError::EmptySandboxDir);
    }
    let absolute = std::path::absolute(dir).map_err(|e| invalid(dir, &e.to_string()))?;
    Ok(normalize_path(&absolute))
}

/// Resolve a shell working directory. Empty means the sandbox itself and
/// relative directories are taken relative to the sandbox.
pub fn resolve_cwd(sandbox_dir: &Path, cwd: &Path) -> PathBuf {
    if cwd.as_os_str().is_empty() {
        return sandbox_dir.to_path_buf();
    }
    if cwd.is_absolute() {
        normalize_path(cwd)
    } else {
        normalize_path(&sandbox_dir.join(cwd))
    }
}

/// Whether `path` is `base` or one of its descendants. Both must already be
/// normalized.
pub fn is_within(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

fn invalid(path: &Path, reason: &str) -> AuthError {
    AuthError::InvalidPath {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
