//! Strict and permissive sandbox authorizers.
//!
//! Both confine tools to one sandbox directory and escalate to the approval
//! broker when policy cannot decide on its own.
//!
//! | Request                          | Strict          | Permissive       |
//! |----------------------------------|-----------------|------------------|
//! | read/write outside sandbox       | deny            | prompt           |
//! | granted read outside sandbox     | deny            | allow            |
//! | granted read inside, explicit    | allow           | allow            |
//! | read/write inside, explicit      | prompt          | prompt           |
//! | read/write inside                | allow           | allow            |
//! | shell, cwd outside sandbox       | deny            | prompt           |
//! | shell blocked                    | deny            | deny             |
//! | shell safe                       | allow           | allow            |
//! | shell safe, explicit             | prompt          | prompt           |
//! | shell dangerous/inscrutable/none | prompt          | prompt           |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use toolgate_traits::{AuthError, Authorizer, Result};
use tracing::debug;

use super::broker::{ApprovalBroker, DEFAULT_QUEUE_CAPACITY, UserRequest};
use super::classifier::CommandCheckResult;
use super::commands::ShellAllowedCommands;
use super::grants::{GrantStore, is_read_grantable};
use super::prompt::{FileOperation, file_prompt, shell_prompt};
use crate::paths::{is_within, normalize_absolute, resolve_cwd, resolve_sandbox_dir};

/// How a sandbox authorizer treats requests that leave the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxMode {
    /// Outside-sandbox access is denied without asking.
    Strict,
    /// Outside-sandbox access is escalated to the user.
    Permissive,
}

#[derive(Debug)]
pub struct SandboxAuthorizer {
    mode: SandboxMode,
    sandbox_dir: PathBuf,
    commands: Arc<ShellAllowedCommands>,
    broker: ApprovalBroker,
    grants: GrantStore,
}

impl SandboxAuthorizer {
    pub fn new(
        mode: SandboxMode,
        sandbox_dir: impl AsRef<Path>,
        commands: Arc<ShellAllowedCommands>,
        queue_capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<UserRequest>)> {
        let sandbox_dir = resolve_sandbox_dir(sandbox_dir.as_ref())?;
        let (broker, requests) = ApprovalBroker::new(queue_capacity);
        let authorizer = Self {
            mode,
            sandbox_dir,
            commands,
            broker,
            grants: GrantStore::new(),
        };
        Ok((authorizer, requests))
    }

    pub fn mode(&self) -> SandboxMode {
        self.mode
    }

    /// Number of requests waiting for the user.
    pub fn pending_count(&self) -> usize {
        self.broker.pending_count()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.broker.is_closed() {
            return Err(AuthError::AuthorizerClosed);
        }
        Ok(())
    }

    fn outside_sandbox(&self, path: &Path) -> AuthError {
        AuthError::OutsideSandbox {
            path: path.to_path_buf(),
            sandbox: self.sandbox_dir.clone(),
        }
    }

    async fn authorize_file(
        &self,
        operation: FileOperation,
        request_permission: bool,
        reason: &str,
        tool_name: &str,
        abs_paths: &[PathBuf],
    ) -> Result<()> {
        self.ensure_open()?;
        if abs_paths.is_empty() {
            return Ok(());
        }

        let paths = abs_paths
            .iter()
            .map(|p| normalize_absolute(p))
            .collect::<Result<Vec<_>>>()?;
        let outside = paths.iter().find(|p| !is_within(p, &self.sandbox_dir));

        if let Some(path) = outside
            && self.mode == SandboxMode::Strict
        {
            debug!(tool = tool_name, path = %path.display(), "Denied access outside sandbox");
            return Err(self.outside_sandbox(path));
        }

        // Only paths that would otherwise prompt need a grant.
        if operation == FileOperation::Read && is_read_grantable(tool_name) {
            let needs_grant = paths
                .iter()
                .filter(|p| request_permission || !is_within(p, &self.sandbox_dir))
                .cloned()
                .collect::<Vec<_>>();
            if self.grants.all_granted(&self.sandbox_dir, &needs_grant) {
                debug!(tool = tool_name, "Allowed granted read");
                return Ok(());
            }
        }

        if outside.is_none() && !request_permission {
            debug!(tool = tool_name, op = operation.verb(), "Allowed access inside sandbox");
            return Ok(());
        }

        let prompt = file_prompt(
            operation,
            tool_name,
            &paths,
            outside.is_none(),
            request_permission,
            reason,
        );
        self.broker.request_approval(prompt, tool_name, &[]).await
    }
}

#[async_trait]
impl Authorizer for SandboxAuthorizer {
    fn sandbox_dir(&self) -> &Path {
        &self.sandbox_dir
    }

    fn without_code_unit(self: Arc<Self>) -> Arc<dyn Authorizer> {
        self
    }

    async fn is_authorized_for_read(
        &self,
        request_permission: bool,
        reason: &str,
        tool_name: &str,
        abs_paths: &[PathBuf],
    ) -> Result<()> {
        self.authorize_file(FileOperation::Read, request_permission, reason, tool_name, abs_paths)
            .await
    }

    async fn is_authorized_for_write(
        &self,
        request_permission: bool,
        reason: &str,
        tool_name: &str,
        abs_paths: &[PathBuf],
    ) -> Result<()> {
        self.authorize_file(FileOperation::Write, request_permission, reason, tool_name, abs_paths)
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
        let cwd = resolve_cwd(&self.sandbox_dir, cwd);
        let cwd_inside = is_within(&cwd, &self.sandbox_dir);
        let classification = self.commands.check(argv)?;

        if classification == CommandCheckResult::Blocked {
            debug!(command = %argv.join(" "), "Denied blocked command");
            return Err(AuthError::BlockedCommand {
                command: argv.join(" "),
            });
        }
        if !cwd_inside && self.mode == SandboxMode::Strict {
            return Err(AuthError::CwdOutsideSandbox {
                cwd,
                sandbox: self.sandbox_dir.clone(),
            });
        }
        if classification == CommandCheckResult::Safe && !request_permission && cwd_inside {
            debug!(command = %argv.join(" "), "Allowed safe command");
            return Ok(());
        }

        let prompt = shell_prompt(
            argv,
            classification,
            &cwd,
            cwd_inside,
            request_permission,
            reason,
        );
        self.broker.request_approval(prompt, "shell", argv).await
    }

    fn close(&self) {
        self.broker.close();
    }

    fn accept_grants(&self, message: &str) -> Result<()> {
        self.grants.add_message(message);
        Ok(())
    }
}

/// Strict sandbox authorizer with the default queue capacity.
pub fn new_sandbox_authorizer(
    sandbox_dir: impl AsRef<Path>,
    commands: Arc<ShellAllowedCommands>,
) -> Result<(Arc<dyn Authorizer>, mpsc::Receiver<UserRequest>)> {
    new_sandbox_authorizer_with_capacity(
        SandboxMode::Strict,
        sandbox_dir,
        commands,
        DEFAULT_QUEUE_CAPACITY,
    )
}

/// Permissive sandbox authorizer with the default queue capacity.
pub fn new_permissive_sandbox_authorizer(
    sandbox_dir: impl AsRef<Path>,
    commands: Arc<ShellAllowedCommands>,
) -> Result<(Arc<dyn Authorizer>, mpsc::Receiver<UserRequest>)> {
    new_sandbox_authorizer_with_capacity(
        SandboxMode::Permissive,
        sandbox_dir,
        commands,
        DEFAULT_QUEUE_CAPACITY,
    )
}

pub fn new_sandbox_authorizer_with_capacity(
    mode: SandboxMode,
    sandbox_dir: impl AsRef<Path>,
    commands: Arc<ShellAllowedCommands>,
    queue_capacity: usize,
) -> Result<(Arc<dyn Authorizer>, mpsc::Receiver<UserRequest>)> {
    let (authorizer, requests) = SandboxAuthorizer::new(mode, sandbox_dir, commands, queue_capacity)?;
    Ok((Arc::new(authorizer), requests))
}
