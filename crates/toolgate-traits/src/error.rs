//! Error types returned by authorizers.

use std::path::PathBuf;

use thiserror::Error;

/// Authorization error types.
///
/// Variants fall into four groups: input errors (never reach the approval
/// queue), policy denials, the lifecycle error raised once an authorizer is
/// closing, and the grant capability error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("empty command")]
    EmptyCommand,

    #[error("sandbox directory must not be empty")]
    EmptySandboxDir,

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("authorization denied")]
    AuthorizationDenied,

    #[error("command is blocked: {command}")]
    BlockedCommand { command: String },

    #[error("path '{}' is outside the sandbox '{}'", path.display(), sandbox.display())]
    OutsideSandbox { path: PathBuf, sandbox: PathBuf },

    #[error("working directory '{}' is outside the sandbox '{}'", cwd.display(), sandbox.display())]
    CwdOutsideSandbox { cwd: PathBuf, sandbox: PathBuf },

    #[error("path '{}' is outside the code unit '{unit}'", path.display())]
    OutsideCodeUnit { path: PathBuf, unit: String },

    #[error("authorizer is closed")]
    AuthorizerClosed,

    #[error("authorizer cannot accept grants")]
    CannotAcceptGrants,
}

impl AuthError {
    /// True for expected policy outcomes the caller should surface to the user.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::AuthorizationDenied
                | Self::BlockedCommand { .. }
                | Self::OutsideSandbox { .. }
                | Self::CwdOutsideSandbox { .. }
                | Self::OutsideCodeUnit { .. }
        )
    }

    /// True once the authorizer has started shutting down.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::AuthorizerClosed)
    }
}

/// Result type alias for authorization operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_classification() {
        assert!(AuthError::AuthorizationDenied.is_denial());
        assert!(
            AuthError::BlockedCommand {
                command: "curl".to_string()
            }
            .is_denial()
        );
        assert!(!AuthError::AuthorizerClosed.is_denial());
        assert!(!AuthError::EmptyCommand.is_denial());
        assert!(AuthError::AuthorizerClosed.is_closed());
    }

    #[test]
    fn test_outside_sandbox_message_names_both_paths() {
        let err = AuthError::OutsideSandbox {
            path: PathBuf::from("/etc/passwd"),
            sandbox: PathBuf::from("/work"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/etc/passwd"));
        assert!(msg.contains("/work"));
        assert!(msg.contains("outside"));
    }
}
