//! Code-unit authorizer: narrows another authorizer to one code unit.
//!
//! Writes, and reads by the strict-read tools, must stay inside the unit and
//! are denied on the spot otherwise. Everything that passes is forwarded to
//! the fallback unchanged, so the fallback's own sandbox policy still
//! applies. Shell commands always go straight to the fallback.
//!
//! ```text
//!                ┌─────────────── CodeUnitAuthorizer ───────────────┐
//! write ───────► │ outside unit? ── yes ──► OutsideCodeUnit          │
//! strict read ─► │      │ no (or granted read)                       │
//! other read ──► │      ▼                                            │
//! shell ───────► │  fallback (Strict / Permissive / AutoApprove)    │
//!                └──────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use toolgate_traits::{AuthError, Authorizer, CodeUnit, Result};
use tracing::debug;

use super::grants::{GrantStore, is_read_grantable};
use crate::paths::{is_within, normalize_absolute, normalize_path};

/// Tools whose reads are confined to the code unit.
pub const STRICT_READ_TOOLS: &[&str] = &["read_file", "ls", "grep"];

pub fn is_strict_read_tool(tool_name: &str) -> bool {
    STRICT_READ_TOOLS.contains(&tool_name)
}

/// A code unit backed by a directory.
#[derive(Debug, Clone)]
pub struct DirectoryCodeUnit {
    base_dir: PathBuf,
    name: String,
    recursive: bool,
}

impl DirectoryCodeUnit {
    /// Unit containing the directory and everything beneath it.
    pub fn new(base_dir: impl AsRef<Path>, name: impl Into<String>) -> Self {
        Self {
            base_dir: normalize_path(base_dir.as_ref()),
            name: name.into(),
            recursive: true,
        }
    }

    /// Unit containing only the directory's direct entries, like a source
    /// package whose subdirectories are separate packages.
    pub fn package(base_dir: impl AsRef<Path>, name: impl Into<String>) -> Self {
        Self {
            recursive: false,
            ..Self::new(base_dir, name)
        }
    }
}

impl CodeUnit for DirectoryCodeUnit {
    fn includes(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        if self.recursive {
            is_within(&path, &self.base_dir)
        } else {
            path == self.base_dir || path.parent() == Some(self.base_dir.as_path())
        }
    }

    fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub struct CodeUnitAuthorizer {
    unit: Arc<dyn CodeUnit>,
    fallback: Arc<dyn Authorizer>,
    grants: GrantStore,
    closed: AtomicBool,
}

impl CodeUnitAuthorizer {
    /// Wrap `fallback`. The unit must lie inside the fallback's sandbox.
    pub fn try_new(unit: Arc<dyn CodeUnit>, fallback: Arc<dyn Authorizer>) -> Result<Self> {
        let base = normalize_path(unit.base_dir());
        if !base.is_absolute() || !is_within(&base, fallback.sandbox_dir()) {
            return Err(AuthError::OutsideSandbox {
                path: base,
                sandbox: fallback.sandbox_dir().to_path_buf(),
            });
        }
        Ok(Self {
            unit,
            fallback,
            grants: GrantStore::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn unit(&self) -> &Arc<dyn CodeUnit> {
        &self.unit
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AuthError::AuthorizerClosed);
        }
        Ok(())
    }

    /// First path outside the unit, skipping reads the user granted.
    fn first_escape<'a>(&self, paths: &'a [PathBuf], granted_reads: bool) -> Option<&'a PathBuf> {
        paths.iter().find(|path| {
            !self.unit.includes(path)
                && !(granted_reads && self.grants.is_granted(self.fallback.sandbox_dir(), path))
        })
    }

    fn outside_unit(&self, path: &Path) -> AuthError {
        debug!(unit = self.unit.name(), path = %path.display(), "Denied access outside code unit");
        AuthError::OutsideCodeUnit {
            path: path.to_path_buf(),
            unit: self.unit.name().to_string(),
        }
    }
}

#[async_trait]
impl Authorizer for CodeUnitAuthorizer {
    fn sandbox_dir(&self) -> &Path {
        self.fallback.sandbox_dir()
    }

    fn code_unit_dir(&self) -> Option<&Path> {
        Some(self.unit.base_dir())
    }

    fn is_code_unit_domain(&self) -> bool {
        true
    }

    fn without_code_unit(self: Arc<Self>) -> Arc<dyn Authorizer> {
        Arc::clone(&self.fallback).without_code_unit()
    }

    async fn is_authorized_for_read(
        &self,
        request_permission: bool,
        reason: &str,
        tool_name: &str,
        abs_paths: &[PathBuf],
    ) -> Result<()> {
        self.ensure_open()?;
        if is_strict_read_tool(tool_name) {
            let paths = abs_paths
                .iter()
                .map(|p| normalize_absolute(p))
                .collect::<Result<Vec<_>>>()?;
            if let Some(path) = self.first_escape(&paths, is_read_grantable(tool_name)) {
                return Err(self.outside_unit(path));
            }
        }
        self.fallback
            .is_authorized_for_read(request_permission, reason, tool_name, abs_paths)
            .await
    }

    async fn is_authorized_for_write(
        &self,
        request_permission: bool,
        reason: &str,
        tool_name: &str,
        abs_paths: &[PathBuf],
    ) -> Result<()> {
        self.ensure_open()?;
        let paths = abs_paths
            .iter()
            .map(|p| normalize_absolute(p))
            .collect::<Result<Vec<_>>>()?;
        if let Some(path) = self.first_escape(&paths, false) {
            return Err(self.outside_unit(path));
        }
        self.fallback
            .is_authorized_for_write(request_permission, reason, tool_name, abs_paths)
            .await
    }

    async fn is_shell_authorized(
        &self,
        request_permission: bool,
        reason: &str,
        cwd: &Path,
        argv: &[String],
    ) -> Result<()> {
        self.ensure_open()?;
        self.fallback
            .is_shell_authorized(request_permission, reason, cwd, argv)
            .await
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.fallback.close();
    }

    fn accept_grants(&self, message: &str) -> Result<()> {
        self.grants.add_message(message);
        Ok(())
    }
}

/// Narrow `fallback` to `unit`.
///
/// # Panics
///
/// Panics if the unit's base directory is not inside the fallback's sandbox.
pub fn new_code_unit_authorizer(
    unit: Arc<dyn CodeUnit>,
    fallback: Arc<dyn Authorizer>,
) -> Arc<dyn Authorizer> {
    match CodeUnitAuthorizer::try_new(unit, fallback) {
        Ok(authorizer) => Arc::new(authorizer),
        Err(e) => panic!("code unit must be inside the sandbox: {e}"),
    }
}
