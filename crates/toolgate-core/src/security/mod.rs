//! Authorization policies for tool file access and shell execution.
//!
//! Every read, write and shell command a tool attempts goes through an
//! [`Authorizer`](toolgate_traits::Authorizer). Policy decides most requests
//! on the spot; the rest become approval requests that wait for a human.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Authorization Core                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  Tool ──► CodeUnitAuthorizer (optional) ──► outside unit     │
//! │                    │                        → deny           │
//! │                    ▼                                         │
//! │           SandboxAuthorizer / AutoApproveAuthorizer          │
//! │                    │                                         │
//! │        ┌───────────┼────────────────┐                        │
//! │        ▼           ▼                ▼                        │
//! │   GrantStore   classifier::check   sandbox boundary          │
//! │   (@mentions)  (ShellAllowedCommands)                        │
//! │        │           │                │                        │
//! │        └───────────┴──── allow / deny / undecided            │
//! │                                          │                   │
//! │                                          ▼                   │
//! │                                   ApprovalBroker             │
//! │                         (bounded queue of UserRequest)       │
//! │                                          │                   │
//! │                                          ▼                   │
//! │                               consumer: allow / disallow     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use toolgate_core::security::{ShellAllowedCommands, new_sandbox_authorizer};
//!
//! let (authorizer, mut requests) =
//!     new_sandbox_authorizer("/work", Arc::new(ShellAllowedCommands::new()))?;
//!
//! tokio::spawn(async move {
//!     while let Some(request) = requests.recv().await {
//!         println!("{}", request.prompt);
//!         request.disallow();
//!     }
//! });
//!
//! authorizer
//!     .is_shell_authorized(false, "", Path::new(""), &["git".into(), "push".into()])
//!     .await?;
//! ```

mod auto_approve;
mod broker;
mod classifier;
mod code_unit;
mod commands;
mod grants;
mod prompt;
mod sandbox;

pub use auto_approve::{AutoApproveAuthorizer, new_auto_approve_authorizer};
pub use broker::{ApprovalBroker, AuthDecision, DEFAULT_QUEUE_CAPACITY, UserRequest};
pub use classifier::{CommandCheckResult, check};
pub use code_unit::{
    CodeUnitAuthorizer, DirectoryCodeUnit, STRICT_READ_TOOLS, is_strict_read_tool,
    new_code_unit_authorizer,
};
pub use commands::{CommandMatcher, CommandsConfig, ShellAllowedCommands};
pub use grants::{
    GrantStore, READ_GRANTABLE_TOOLS, add_grants_from_user_message, extract_mentions,
    is_read_grantable,
};
pub use prompt::{FileOperation, file_prompt, shell_prompt};
pub use sandbox::{
    SandboxAuthorizer, SandboxMode, new_permissive_sandbox_authorizer, new_sandbox_authorizer,
    new_sandbox_authorizer_with_capacity,
};
