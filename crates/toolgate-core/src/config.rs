//! Authorizer configuration file support
//!
//! Loads configuration from ~/.config/toolgate/config.toml

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use toolgate_traits::Authorizer;
use tracing::debug;

use crate::security::{
    AutoApproveAuthorizer, CommandsConfig, DEFAULT_QUEUE_CAPACITY, SandboxMode,
    ShellAllowedCommands, UserRequest, new_sandbox_authorizer_with_capacity,
};

/// Which policy the configured authorizer applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizerMode {
    #[default]
    Strict,
    Permissive,
    AutoApprove,
}

/// Authorizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizerConfig {
    /// Policy to apply
    #[serde(default)]
    pub mode: AuthorizerMode,
    /// Sandbox directory; callers fall back to the working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_dir: Option<PathBuf>,
    /// Capacity of the approval request queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Seed the command registry with the built-in tables
    #[serde(default = "default_true")]
    pub include_default_commands: bool,
    /// Extra command matchers
    #[serde(default)]
    pub commands: CommandsConfig,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_true() -> bool {
    true
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            mode: AuthorizerMode::default(),
            sandbox_dir: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            include_default_commands: true,
            commands: CommandsConfig::default(),
        }
    }
}

/// A configured authorizer and, for prompting policies, its request queue.
pub struct AuthorizerHandle {
    pub authorizer: Arc<dyn Authorizer>,
    /// `None` when the policy never asks the user
    pub requests: Option<mpsc::Receiver<UserRequest>>,
}

impl AuthorizerConfig {
    /// Load configuration from default path
    pub fn load() -> Result<Self> {
        Self::load_from_path(Self::default_path())
    }

    /// Load configuration from a specific path. A missing file yields the
    /// defaults; an unreadable or malformed one is an error.
    pub fn load_from_path(path: Option<PathBuf>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("toolgate").join("config.toml"))
    }

    /// Command registry described by this configuration.
    pub fn shell_commands(&self) -> Arc<ShellAllowedCommands> {
        Arc::new(ShellAllowedCommands::from_config(
            &self.commands,
            self.include_default_commands,
        ))
    }

    /// Build the configured authorizer for `sandbox_dir`.
    pub fn build(&self, sandbox_dir: &Path) -> Result<AuthorizerHandle> {
        let mode = match self.mode {
            AuthorizerMode::AutoApprove => {
                let authorizer = AutoApproveAuthorizer::try_new(sandbox_dir)
                    .context("Failed to create auto-approve authorizer")?;
                return Ok(AuthorizerHandle {
                    authorizer: Arc::new(authorizer),
                    requests: None,
                });
            }
            AuthorizerMode::Strict => SandboxMode::Strict,
            AuthorizerMode::Permissive => SandboxMode::Permissive,
        };

        let (authorizer, requests) = new_sandbox_authorizer_with_capacity(
            mode,
            sandbox_dir,
            self.shell_commands(),
            self.queue_capacity,
        )
        .context("Failed to create sandbox authorizer")?;
        Ok(AuthorizerHandle {
            authorizer,
            requests: Some(requests),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{CommandCheckResult, CommandMatcher};

    #[test]
    fn test_parse_full_config() {
        let config = AuthorizerConfig::from_toml_str(
            r#"
            mode = "permissive"
            sandbox_dir = "/work"
            queue_capacity = 2
            include_default_commands = false

            [[commands.safe]]
            command = "make"
            args_prefix = ["test"]

            [[commands.blocked]]
            command = "terraform"
            flags = ["-auto-approve"]
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, AuthorizerMode::Permissive);
        assert_eq!(config.sandbox_dir, Some(PathBuf::from("/work")));
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(
            config.commands.safe,
            vec![CommandMatcher::new("make").with_args(["test"])]
        );

        let commands = config.shell_commands();
        fn argv(parts: &[&str]) -> Vec<String> {
            parts.iter().map(|s| s.to_string()).collect()
        }
        assert_eq!(
            commands.check(&argv(&["make", "test"])).unwrap(),
            CommandCheckResult::Safe
        );
        assert_eq!(
            commands
                .check(&argv(&["terraform", "apply", "-auto-approve"]))
                .unwrap(),
            CommandCheckResult::Blocked
        );
        assert_eq!(
            commands.check(&argv(&["curl", "x"])).unwrap(),
            CommandCheckResult::None
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AuthorizerConfig::from_toml_str("").unwrap();
        assert_eq!(config.mode, AuthorizerMode::Strict);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.include_default_commands);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config =
            AuthorizerConfig::load_from_path(Some(temp.path().join("config.toml"))).unwrap();
        assert_eq!(config.mode, AuthorizerMode::Strict);
        assert!(AuthorizerConfig::load_from_path(None).is_ok());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "mode = \"yolo\"").unwrap();
        let err = AuthorizerConfig::load_from_path(Some(path)).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }

    #[tokio::test]
    async fn test_build_modes() {
        let auto = AuthorizerConfig {
            mode: AuthorizerMode::AutoApprove,
            ..Default::default()
        }
        .build(Path::new("/work"))
        .unwrap();
        assert!(auto.requests.is_none());

        let strict = AuthorizerConfig::default().build(Path::new("/work")).unwrap();
        assert!(strict.requests.is_some());
        assert_eq!(strict.authorizer.sandbox_dir(), Path::new("/work"));

        assert!(AuthorizerConfig::default().build(Path::new("")).is_err());
    }
}
