//! Toolgate Core - sandbox authorization for agent tools.
//!
//! Policies, shell command classification, user read grants and the approval
//! broker live in [`security`]; [`config`] builds an authorizer from a TOML
//! file.

pub mod config;
pub mod paths;
pub mod security;

pub use toolgate_traits::{AuthError, Authorizer, CodeUnit, Result};
