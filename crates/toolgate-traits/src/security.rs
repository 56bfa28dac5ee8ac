//! Authorization capability shared by every policy variant.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AuthError, Result};

/// Capability set a tool calls before touching the filesystem or running a
/// shell command.
///
/// Implementations share no base type; a code-unit authorizer is a decorator
/// that holds its fallback by `Arc`. Paths handed in must already be absolute.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Absolute sandbox directory (the outer jail).
    fn sandbox_dir(&self) -> &Path;

    /// Code unit directory, or `None` when the authorizer is not code-unit scoped.
    fn code_unit_dir(&self) -> Option<&Path> {
        None
    }

    fn is_code_unit_domain(&self) -> bool {
        false
    }

    /// The authorizer with any code-unit narrowing removed. Returns itself
    /// when not code-unit scoped.
    fn without_code_unit(self: Arc<Self>) -> Arc<dyn Authorizer>;

    /// Authorize reading `abs_paths` on behalf of `tool_name`.
    ///
    /// `request_permission` forces a prompt even where policy would
    /// auto-allow. `reason` is appended to the prompt text.
    async fn is_authorized_for_read(
        &self,
        request_permission: bool,
        reason: &str,
        tool_name: &str,
        abs_paths: &[PathBuf],
    ) -> Result<()>;

    /// Authorize writing `abs_paths` on behalf of `tool_name`.
    async fn is_authorized_for_write(
        &self,
        request_permission: bool,
        reason: &str,
        tool_name: &str,
        abs_paths: &[PathBuf],
    ) -> Result<()>;

    /// Authorize running `argv` with working directory `cwd`.
    async fn is_shell_authorized(
        &self,
        request_permission: bool,
        reason: &str,
        cwd: &Path,
        argv: &[String],
    ) -> Result<()>;

    /// Resolve every outstanding approval as closed and reject all future
    /// calls. Idempotent.
    fn close(&self);

    /// Record a user message from which read grants are derived.
    ///
    /// Only reachable through grant fan-out; authorizers without a grant
    /// store keep the default.
    #[doc(hidden)]
    fn accept_grants(&self, message: &str) -> Result<()> {
        let _ = message;
        Err(AuthError::CannotAcceptGrants)
    }
}

/// A boundary nested inside the sandbox (for example one source package).
pub trait CodeUnit: Send + Sync {
    /// Whether `path` belongs to the unit.
    fn includes(&self, path: &Path) -> bool;

    fn base_dir(&self) -> &Path;

    /// Name used in diagnostics.
    fn name(&self) -> &str;
}

/// Identity comparison for trait objects; ignores vtable differences.
pub fn same_authorizer(a: &Arc<dyn Authorizer>, b: &Arc<dyn Authorizer>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
