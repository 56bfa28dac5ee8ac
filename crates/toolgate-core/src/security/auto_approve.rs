//! Authorizer that approves everything.
//!
//! Used for trusted, unattended runs. Blocked commands and paths outside the
//! sandbox are allowed too; the sandbox directory is only reported.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use toolgate_traits::{Authorizer, Result};

use crate::paths::resolve_sandbox_dir;

#[derive(Debug, Clone)]
pub struct AutoApproveAuthorizer {
    sandbox_dir: PathBuf,
}

impl AutoApproveAuthorizer {
    pub fn try_new(sandbox_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            sandbox_dir: resolve_sandbox_dir(sandbox_dir.as_ref())?,
        })
    }
}

#[async_trait]
impl Authorizer for AutoApproveAuthorizer {
    fn sandbox_dir(&self) -> &Path {
        &self.sandbox_dir
    }

    fn without_code_unit(self: Arc<Self>) -> Arc<dyn Authorizer> {
        self
    }

    async fn is_authorized_for_read(
        &self,
        _request_permission: bool,
        _reason: &str,
        _tool_name: &str,
        _abs_paths: &[PathBuf],
    ) -> Result<()> {
        Ok(())
    }

    async fn is_authorized_for_write(
        &self,
        _request_permission: bool,
        _reason: &str,
        _tool_name: &str,
        _abs_paths: &[PathBuf],
    ) -> Result<()> {
        Ok(())
    }

    async fn is_shell_authorized(
        &self,
        _request_permission: bool,
        _reason: &str,
        _cwd: &Path,
        _argv: &[String],
    ) -> Result<()> {
        Ok(())
    }

    fn close(&self) {}
}

/// Build an auto-approving authorizer.
///
/// # Panics
///
/// Panics if `sandbox_dir` is empty or cannot be made absolute. Use
/// [`AutoApproveAuthorizer::try_new`] to handle that as an error.
pub fn new_auto_approve_authorizer(sandbox_dir: impl AsRef<Path>) -> Arc<dyn Authorizer> {
    match AutoApproveAuthorizer::try_new(sandbox_dir) {
        Ok(authorizer) => Arc::new(authorizer),
        Err(e) => panic!("invalid auto-approve sandbox directory: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::grants::add_grants_from_user_message;
    use toolgate_traits::AuthError;

    #[tokio::test]
    async fn test_allows_everything() {
        let auth = new_auto_approve_authorizer("/work");
        auth.is_authorized_for_write(true, "", "write_file", &[PathBuf::from("/etc/passwd")])
            .await
            .unwrap();
        auth.is_shell_authorized(
            false,
            "",
            Path::new("/"),
            &["curl".to_string(), "example.com".to_string()],
        )
        .await
        .unwrap();
        auth.is_shell_authorized(false, "", Path::new(""), &[]).await.unwrap();
    }

    #[test]
    #[should_panic(expected = "invalid auto-approve sandbox directory")]
    fn test_empty_dir_panics() {
        let _ = new_auto_approve_authorizer("");
    }

    #[test]
    fn test_does_not_accept_grants() {
        let auth = new_auto_approve_authorizer("/work");
        assert_eq!(
            add_grants_from_user_message(&auth, "@docs"),
            Err(AuthError::CannotAcceptGrants)
        );
    }
}
